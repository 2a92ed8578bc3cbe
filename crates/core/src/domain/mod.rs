pub mod calculator;
pub mod conversation;
pub mod intent;
pub mod product;
