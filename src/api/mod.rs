use rocket::{Catcher, Route};

mod auth;
mod catchers;
mod elections;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(elections::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers::catchers()
}
