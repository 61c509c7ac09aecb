use crate::{RateLimiter, RateLimiterError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower [`Layer`] that applies a [`RateLimiter`] to a service.
///
/// # Examples
///
/// ```
/// use tra_ratelimiter::RateLimiterConfig;
/// use tower::ServiceBuilder;
///
/// # async fn example() {
/// let layer = RateLimiterConfig::builder().max_tokens(50).build().layer();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(my_service());
/// # }
/// # fn my_service() -> impl tower::Service<String, Response = String, Error = std::io::Error> {
/// #     tower::service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) })
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimiterLayer {
    limiter: RateLimiter,
}

impl RateLimiterLayer {
    pub(crate) fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimiterService {
            inner: service,
            limiter: self.limiter.clone(),
        }
    }
}

/// The [`tower::Service`] produced by [`RateLimiterLayer`].
#[derive(Clone)]
pub struct RateLimiterService<S> {
    inner: S,
    limiter: RateLimiter,
}

impl<S, Req> Service<Req> for RateLimiterService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimiterError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            limiter.acquire().await?;
            inner.call(req).await.map_err(|_| RateLimiterError::Cancelled)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RateLimiterConfig;
    use std::time::Duration;
    use tower::{ServiceExt, service_fn};

    #[tokio::test]
    async fn layered_service_admits_then_rate_limits() {
        let layer = RateLimiterConfig::builder()
            .max_tokens(1)
            .refill_rate_per_sec(0.0)
            .retry_after(Duration::from_millis(1))
            .max_retries(1)
            .build()
            .layer();

        let service =
            service_fn(|req: String| async move { Ok::<_, std::io::Error>(format!("ok:{req}")) });
        let mut service = layer.layer(service);

        let first = service.ready().await.unwrap().call("a".into()).await;
        assert!(first.is_ok());

        let second = service.ready().await.unwrap().call("b".into()).await;
        assert!(second.is_err());
    }
}
