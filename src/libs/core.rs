pub mod groups;
pub mod ids;
pub mod images;
pub mod mentions;
pub mod models;
pub mod notifications;
pub mod reply;
pub mod session;
pub mod throttle;
pub mod visibility;
