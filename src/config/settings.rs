use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    pub addr: SocketAddr,
    pub database_url: String,
    pub jwt_secret: String,
    /// Registering with this email grants the admin flag.
    pub admin_email: Option<String>,
    /// Push dispatch is disabled when no server key is configured.
    pub fcm_endpoint: String,
    pub fcm_server_key: Option<String>,
}

impl Settings {
    pub fn new() -> Self {
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        let admin_email = env::var("ADMIN_EMAIL").ok();
        let fcm_endpoint = env::var("FCM_ENDPOINT")
            .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string());
        let fcm_server_key = env::var("FCM_SERVER_KEY").ok();

        Self {
            port,
            addr,
            database_url,
            jwt_secret,
            admin_email,
            fcm_endpoint,
            fcm_server_key,
        }
    }
}
