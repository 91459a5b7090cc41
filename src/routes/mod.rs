pub mod health_check;
pub mod home;
pub mod not_found;
pub mod send_otp;
pub mod subscriber_count;
pub mod verify_otp;
