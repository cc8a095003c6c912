mod order;
mod product;
mod project;
mod store;
mod user;

pub use order::*;
pub use product::*;
pub use project::*;
pub use store::*;
pub use user::*;
