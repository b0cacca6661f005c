// src/cookie.rs

//! Generation of X authority cookies.

use uuid::Uuid;

/// Produces a fresh authentication cookie: 32 lowercase hexadecimal
/// characters of a 128-bit value drawn from the operating system's
/// random source.
pub fn generate_cookie() -> String {
    Uuid::new_v4().simple().to_string()
}
