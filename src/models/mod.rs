pub mod task;
pub mod user;

pub use task::{Task, TaskInput, TaskPatch, TaskQuery, TaskStats, TaskStatus, TaskSummary};
pub use user::{
    IssuedToken, NewUser, Profile, ProfileSummary, ProfileUpdate, PublicUser, User, UserPatch,
};
