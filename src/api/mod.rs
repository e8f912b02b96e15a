use rocket::Route;

mod candidates;
mod common;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(candidates::routes());
    routes
}
