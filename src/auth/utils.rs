use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(hash: &str, password: &str) -> Result<()> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

/// Every account gets a generated avatar seeded from its id, so profiles
/// are never blank before setup.
pub fn default_avatar_url(user_id: Uuid) -> String {
    format!(
        "https://api.dicebear.com/9.x/avataaars/svg?seed={}&backgroundColor=e0e7ff",
        user_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip_verifies() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password(&hash, "hunter2hunter2").is_ok());
        assert!(verify_password(&hash, "wrong-password").is_err());
    }

    #[test]
    fn default_avatar_embeds_seed() {
        let id = Uuid::new_v4();
        assert!(default_avatar_url(id).contains(&id.to_string()));
    }
}
