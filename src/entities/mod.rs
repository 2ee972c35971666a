pub mod celebrity;
pub mod celebrity_credit;
pub mod country;
pub mod film;
pub mod trending;
