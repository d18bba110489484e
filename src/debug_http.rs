//! The debug/control HTTP endpoint. Grounded on the `api` surface the
//! corpus's other router project (leaf) gates behind its `warp` feature;
//! only `GET /healthz` is implemented, every other control-plane route
//! named in §4.12 is stubbed `501` rather than built out.

use std::net::SocketAddr;

use warp::http::StatusCode;
use warp::Filter;

pub async fn serve(listen: SocketAddr) {
    let healthz = warp::path("healthz")
        .and(warp::get())
        .map(|| warp::reply::with_status("ok", StatusCode::OK));

    let not_implemented = warp::any()
        .map(|| warp::reply::with_status("not implemented", StatusCode::NOT_IMPLEMENTED));

    let routes = healthz.or(not_implemented);
    warp::serve(routes).run(listen).await;
}
