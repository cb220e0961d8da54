//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of live mentor
//! conversations.

use crate::config::Config;
use moneyquest_core::conversation::MentorSession;
use moneyquest_core::ports::{
    AchievementStore, ActivityLog, AuthService, MentorChatService, PreferenceStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthService>,
    pub mentor: Arc<dyn MentorChatService>,
    pub achievements: Arc<dyn AchievementStore>,
    pub activity: Arc<dyn ActivityLog>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub conversations: ConversationRegistry,
}

//=========================================================================================
// Conversation Registry
//=========================================================================================

/// A live conversation and the user who owns it.
pub struct ConversationEntry {
    pub owner: Uuid,
    pub session: MentorSession,
}

pub type SharedConversation = Arc<Mutex<ConversationEntry>>;

/// In-memory mentor sessions keyed by conversation id. Nothing here is persisted.
#[derive(Clone, Default)]
pub struct ConversationRegistry {
    inner: Arc<Mutex<HashMap<Uuid, SharedConversation>>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session for `owner` and returns its id.
    pub async fn create(&self, owner: Uuid, history_window: usize) -> Uuid {
        let id = Uuid::new_v4();
        let entry = ConversationEntry {
            owner,
            session: MentorSession::with_history_window(id, history_window),
        };
        self.inner.lock().await.insert(id, Arc::new(Mutex::new(entry)));
        info!(conversation_id = %id, user_id = %owner, "Mentor conversation created");
        id
    }

    /// Returns the conversation only if `owner` owns it.
    pub async fn get(&self, id: Uuid, owner: Uuid) -> Option<SharedConversation> {
        let conversation = self.inner.lock().await.get(&id).cloned()?;
        let owned = conversation.lock().await.owner == owner;
        owned.then_some(conversation)
    }

    /// Tears the conversation down. Returns `false` if it did not exist for `owner`.
    pub async fn remove(&self, id: Uuid, owner: Uuid) -> bool {
        let Some(conversation) = self.get(id, owner).await else {
            return false;
        };
        conversation.lock().await.session.reset();
        self.inner.lock().await.remove(&id);
        info!(conversation_id = %id, "Mentor conversation torn down");
        true
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conversations_are_scoped_to_their_owner() {
        let registry = ConversationRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let id = registry.create(alice, 10).await;

        assert!(registry.get(id, alice).await.is_some());
        assert!(registry.get(id, bob).await.is_none());
        assert!(!registry.remove(id, bob).await);
        assert!(registry.remove(id, alice).await);
        assert_eq!(registry.len().await, 0);
        assert!(registry.get(id, alice).await.is_none());
    }
}
