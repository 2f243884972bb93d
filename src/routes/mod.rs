/// Router Module Index
///
/// Splits the reference service's routes by access level. Access control is applied
/// at the module level (via Axum layers), so an endpoint cannot be exposed without
/// its router's protection by accident.

/// Routes accessible without a token: health check and login.
pub mod public;

/// Routes protected by the `AuthAccount` extractor middleware, additionally
/// restricted to administrators inside each handler.
pub mod admin;
