pub mod achievements;
pub mod activity;
pub mod cards;
pub mod chips;
pub mod conversation;
pub mod domain;
pub mod mentor;
pub mod ports;

pub use conversation::{MentorSession, SessionError, TurnOutcome};
pub use domain::{
    Achievement, Activity, ActivityKind, Card, EarnedAchievement, Message, MentorProposal,
    MentorRequest, MentorResponse, Mood, TurnMode, UserRole,
};
pub use mentor::{MentorMode, MentorState};
pub use ports::{
    AchievementStore, ActivityLog, AuthService, MentorChatService, PortError, PortResult,
    PreferenceStore,
};
