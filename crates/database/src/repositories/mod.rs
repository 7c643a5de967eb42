pub mod seat;
pub mod session;
pub mod subscription;

pub use seat::PgSeatRepository;
pub use session::PgSessionRepository;
pub use subscription::PgSubscriptionRepository;
