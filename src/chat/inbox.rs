use std::collections::HashSet;

use uuid::Uuid;

/// The viewer's relationship state, materialized from the follows,
/// accepted_chats and blocks tables.
#[derive(Debug, Default)]
pub struct RelationshipState {
    pub following: HashSet<Uuid>,
    pub accepted_chats: HashSet<Uuid>,
    pub blocked: HashSet<Uuid>,
}

/// A directed message edge. Only the endpoints matter for classification.
#[derive(Debug, Clone, Copy)]
pub struct MessageEdge {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
}

/// The viewer's inbox, partitioned into unsolicited requests and accepted
/// conversations. The two lists are always disjoint.
#[derive(Debug, PartialEq, Eq)]
pub struct InboxPartition {
    pub requests: Vec<Uuid>,
    pub accepted: Vec<Uuid>,
}

/// Partitions the viewer's chat partners into requests and accepted
/// conversations.
///
/// Classification is recomputed from raw rows on every read instead of
/// being stored, so it can never drift from the actual message history.
/// It is also asymmetric: A may see B as a request while B sees A as
/// accepted.
///
/// Rules, applied per partner appearing in the message set:
/// - a partner the viewer blocked never appears anywhere;
/// - explicitly accepted peers are accepted, message history or not;
/// - following the partner, or having sent them at least one message,
///   makes the conversation accepted for the viewer;
/// - everything else is a request;
/// - on any collision, accepted wins.
pub fn compute_inbox(
    viewer: Uuid,
    state: &RelationshipState,
    edges: &[MessageEdge],
) -> InboxPartition {
    let mut partners: HashSet<Uuid> = HashSet::new();
    for edge in edges {
        let partner = if edge.sender_id == viewer {
            edge.receiver_id
        } else {
            edge.sender_id
        };
        if partner != viewer {
            partners.insert(partner);
        }
    }

    let mut accepted: HashSet<Uuid> = state
        .accepted_chats
        .iter()
        .copied()
        .filter(|id| !state.blocked.contains(id) && *id != viewer)
        .collect();
    let mut requests: HashSet<Uuid> = HashSet::new();

    for partner in partners {
        if state.blocked.contains(&partner) {
            continue;
        }

        let sent_by_viewer = edges
            .iter()
            .any(|e| e.sender_id == viewer && e.receiver_id == partner);

        if state.following.contains(&partner)
            || state.accepted_chats.contains(&partner)
            || sent_by_viewer
        {
            accepted.insert(partner);
        } else {
            requests.insert(partner);
        }
    }

    // Accepted wins: a peer must never show up in both lists.
    for id in &accepted {
        requests.remove(id);
    }

    let mut requests: Vec<Uuid> = requests.into_iter().collect();
    let mut accepted: Vec<Uuid> = accepted.into_iter().collect();
    requests.sort();
    accepted.sort();

    InboxPartition { requests, accepted }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn edge(sender: Uuid, receiver: Uuid) -> MessageEdge {
        MessageEdge {
            sender_id: sender,
            receiver_id: receiver,
        }
    }

    #[test]
    fn single_inbound_message_is_a_request() {
        let me = uid(1);
        let peer = uid(2);
        let inbox = compute_inbox(me, &RelationshipState::default(), &[edge(peer, me)]);
        assert_eq!(inbox.requests, vec![peer]);
        assert!(inbox.accepted.is_empty());
    }

    #[test]
    fn replying_moves_peer_to_accepted() {
        let me = uid(1);
        let peer = uid(2);
        let edges = [edge(peer, me), edge(me, peer)];
        let inbox = compute_inbox(me, &RelationshipState::default(), &edges);
        assert!(inbox.requests.is_empty());
        assert_eq!(inbox.accepted, vec![peer]);
    }

    #[test]
    fn outbound_initiated_conversation_is_accepted_for_sender() {
        let me = uid(1);
        let peer = uid(2);
        let inbox = compute_inbox(me, &RelationshipState::default(), &[edge(me, peer)]);
        assert_eq!(inbox.accepted, vec![peer]);
        assert!(inbox.requests.is_empty());
    }

    #[test]
    fn following_the_sender_accepts_the_conversation() {
        let me = uid(1);
        let peer = uid(2);
        let state = RelationshipState {
            following: [peer].into_iter().collect(),
            ..Default::default()
        };
        let inbox = compute_inbox(me, &state, &[edge(peer, me)]);
        assert_eq!(inbox.accepted, vec![peer]);
        assert!(inbox.requests.is_empty());
    }

    #[test]
    fn explicit_accept_wins_even_with_only_inbound_messages() {
        let me = uid(1);
        let peer = uid(2);
        let state = RelationshipState {
            accepted_chats: [peer].into_iter().collect(),
            ..Default::default()
        };
        let inbox = compute_inbox(me, &state, &[edge(peer, me)]);
        assert_eq!(inbox.accepted, vec![peer]);
        assert!(inbox.requests.is_empty());
    }

    #[test]
    fn accepted_chats_seed_appears_without_any_messages() {
        let me = uid(1);
        let peer = uid(2);
        let state = RelationshipState {
            accepted_chats: [peer].into_iter().collect(),
            ..Default::default()
        };
        let inbox = compute_inbox(me, &state, &[]);
        assert_eq!(inbox.accepted, vec![peer]);
    }

    #[test]
    fn blocked_peer_never_appears_in_either_list() {
        let me = uid(1);
        let peer = uid(2);
        let state = RelationshipState {
            // Blocked peers are filtered even if they were followed and
            // explicitly accepted before the block.
            following: [peer].into_iter().collect(),
            accepted_chats: [peer].into_iter().collect(),
            blocked: [peer].into_iter().collect(),
        };
        let edges = [edge(peer, me), edge(me, peer)];
        let inbox = compute_inbox(me, &state, &edges);
        assert!(inbox.requests.is_empty());
        assert!(inbox.accepted.is_empty());
    }

    #[test]
    fn partition_is_always_disjoint() {
        let me = uid(1);
        let accepted_peer = uid(2);
        let requester = uid(3);
        let state = RelationshipState {
            accepted_chats: [accepted_peer].into_iter().collect(),
            ..Default::default()
        };
        let edges = [
            edge(accepted_peer, me),
            edge(requester, me),
            edge(me, accepted_peer),
        ];
        let inbox = compute_inbox(me, &state, &edges);
        assert_eq!(inbox.requests, vec![requester]);
        assert_eq!(inbox.accepted, vec![accepted_peer]);
        for id in &inbox.accepted {
            assert!(!inbox.requests.contains(id));
        }
    }

    #[test]
    fn no_messages_and_no_relationship_means_no_conversation() {
        let me = uid(1);
        let state = RelationshipState {
            // Following alone does not create a conversation.
            following: [uid(2)].into_iter().collect(),
            ..Default::default()
        };
        let inbox = compute_inbox(me, &state, &[]);
        assert!(inbox.requests.is_empty());
        assert!(inbox.accepted.is_empty());
    }

    #[test]
    fn deleted_history_reverts_to_no_conversation() {
        // After a reject wipes the message rows, recomputation sees an
        // empty edge set and the pair disappears from both lists.
        let me = uid(1);
        let peer = uid(2);
        let before = compute_inbox(me, &RelationshipState::default(), &[edge(peer, me)]);
        assert_eq!(before.requests, vec![peer]);

        let after = compute_inbox(me, &RelationshipState::default(), &[]);
        assert!(after.requests.is_empty());
        assert!(after.accepted.is_empty());
    }

    #[test]
    fn self_edges_are_ignored() {
        let me = uid(1);
        let inbox = compute_inbox(me, &RelationshipState::default(), &[edge(me, me)]);
        assert!(inbox.requests.is_empty());
        assert!(inbox.accepted.is_empty());
    }

    #[test]
    fn classification_is_asymmetric_between_participants() {
        let a = uid(1);
        let b = uid(2);
        let edges = [edge(a, b)];

        // A messaged B first: accepted for A, a request for B.
        let for_a = compute_inbox(a, &RelationshipState::default(), &edges);
        assert_eq!(for_a.accepted, vec![b]);

        let for_b = compute_inbox(b, &RelationshipState::default(), &edges);
        assert_eq!(for_b.requests, vec![a]);
    }
}
