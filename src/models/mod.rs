//! Data models for the storefront

pub mod cart;
pub mod dispute;
pub mod order;
pub mod product;
pub mod schedule;
pub mod user;

pub use cart::Cart;
pub use dispute::{Dispute, DisputeChoice};
pub use order::{NewOrder, Order, OrderItem};
pub use product::{NewProduct, Product};
pub use schedule::{NewSlot, Schedule};
pub use user::{NewUser, User};
