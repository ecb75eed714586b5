use rocket::{response::Redirect, Catcher, Request};

use crate::error::Error;

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthorized, forbidden, not_found]
}

/// Unauthenticated access to a protected operation. Browser-facing paths
/// are sent to the login entry point with the original path as `next`;
/// the API surface gets the structured 401.
#[catch(401)]
fn unauthorized(req: &Request) -> Result<Redirect, Error> {
    let path = req.uri().path().as_str().to_string();
    if path.starts_with("/api") {
        Err(Error::AuthenticationRequired)
    } else {
        Ok(Redirect::to(format!("/auth/login?next={path}")))
    }
}

#[catch(403)]
fn forbidden() -> Error {
    Error::Forbidden
}

#[catch(404)]
fn not_found(req: &Request) -> Error {
    Error::NotFound(format!("Resource {}", req.uri().path().as_str()))
}
