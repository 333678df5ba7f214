//! In-process rate limiting middleware
//!
//! Fixed one-second windows keyed by the caller's `user_hash` query parameter
//! (falling back to the peer address). Suitable for a single process; a
//! shared store would take over in a multi-instance deployment.

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use chrono::Utc;
use futures::future::{ready, LocalBoxFuture, Ready};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::AppError;

// Stale-window entries are swept once the table grows past this.
const WINDOW_TABLE_SWEEP_SIZE: usize = 4096;

type Windows = Arc<Mutex<HashMap<String, (i64, u32)>>>;

#[derive(Clone)]
pub struct RateLimit {
    max_per_second: u32,
    windows: Windows,
}

impl RateLimit {
    pub fn new(max_per_second: u32) -> Self {
        Self {
            max_per_second,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            max_per_second: self.max_per_second,
            windows: self.windows.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    max_per_second: u32,
    windows: Windows,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let key = client_key(&req);
        let now = Utc::now().timestamp();

        let over_limit = {
            let mut windows = self.windows.lock();
            if windows.len() > WINDOW_TABLE_SWEEP_SIZE {
                windows.retain(|_, (window, _)| *window == now);
            }
            let entry = windows.entry(key).or_insert((now, 0));
            if entry.0 != now {
                *entry = (now, 0);
            }
            entry.1 += 1;
            entry.1 > self.max_per_second
        };

        if over_limit {
            return Box::pin(async move {
                Err(AppError::RateLimit {
                    retry_after_seconds: 1,
                }
                .into())
            });
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

fn client_key(req: &ServiceRequest) -> String {
    let from_query = actix_web::web::Query::<HashMap<String, String>>::from_query(
        req.query_string(),
    )
    .ok()
    .and_then(|query| query.get("user_hash").cloned());

    match from_query {
        Some(user_hash) if !user_hash.is_empty() => format!("user:{user_hash}"),
        _ => {
            let peer = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();
            format!("ip:{peer}")
        }
    }
}
