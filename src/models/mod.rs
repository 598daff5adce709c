//! Data models for Libris

pub mod book;
pub mod pagination;
pub mod reservation;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookSummary};
pub use pagination::{Page, PageQuery, PageRequest, Pagination};
pub use reservation::{Reservation, ReservationDetails, ReservationStatus};
pub use user::{Identity, Permission, PermissionSet, User, UserSummary};
