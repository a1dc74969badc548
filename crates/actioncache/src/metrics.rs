//! Provides access to the metrics system.
use std::collections::BTreeMap;
use std::net::{ToSocketAddrs, UdpSocket};
use std::ops::Deref;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use cadence::{Metric, MetricBuilder, StatsdClient, UdpMetricSink};

use crate::config::Metrics;

static METRICS_CLIENT: OnceLock<MetricsClient> = OnceLock::new();

/// The metrics prelude that is necessary to use the client.
pub mod prelude {
    pub use cadence::prelude::*;
}

#[derive(Debug)]
pub struct MetricsClient {
    /// The raw statsd client.
    pub statsd_client: StatsdClient,

    /// A collection of tags and values that will be sent with every metric.
    tags: BTreeMap<String, String>,
}

impl MetricsClient {
    #[inline(always)]
    pub fn send_metric<'a, T>(&'a self, mut metric: MetricBuilder<'a, '_, T>)
    where
        T: Metric + From<String>,
    {
        for (tag, value) in self.tags.iter() {
            metric = metric.with_tag(tag, value);
        }
        metric.send()
    }
}

impl Deref for MetricsClient {
    type Target = StatsdClient;

    fn deref(&self) -> &Self::Target {
        &self.statsd_client
    }
}

/// Tell the metrics system to report to statsd.
///
/// Only the first successful call installs a client, later calls are ignored.
pub fn configure_statsd<A: ToSocketAddrs>(
    prefix: &str,
    host: A,
    tags: BTreeMap<String, String>,
) -> Result<()> {
    let addrs: Vec<_> = host
        .to_socket_addrs()
        .context("failed to resolve statsd host")?
        .collect();
    if let Some(addr) = addrs.first() {
        tracing::info!("Reporting metrics to statsd at {}", addr);
    }
    let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind statsd socket")?;
    socket.set_nonblocking(true)?;
    let sink = UdpMetricSink::from(&addrs[..], socket).context("failed to create statsd sink")?;
    let statsd_client = StatsdClient::from_sink(prefix, sink);

    if METRICS_CLIENT
        .set(MetricsClient {
            statsd_client,
            tags,
        })
        .is_err()
    {
        tracing::debug!("Metrics client already configured");
    }
    Ok(())
}

/// Configures statsd reporting from the `metrics` config section, if a host is set.
pub fn configure(config: &Metrics) -> Result<()> {
    match config.statsd {
        Some(ref host) => configure_statsd(&config.prefix, host.as_str(), config.custom_tags.clone()),
        None => Ok(()),
    }
}

/// Invoke a callback with the current statsd client.
///
/// If statsd is not configured the callback is not invoked. For the most part
/// the [`metric!`](crate::metric) macro should be used instead.
#[inline(always)]
pub fn with_client<F, R>(f: F) -> R
where
    F: FnOnce(&MetricsClient) -> R,
    R: Default,
{
    match METRICS_CLIENT.get() {
        Some(client) => f(client),
        None => Default::default(),
    }
}

/// Emits a metric.
#[macro_export]
macro_rules! metric {
    // counters
    (counter($id:expr) += $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.count_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    // gauges
    (gauge($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.gauge_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};

    // timers
    (timer($id:expr) = $value:expr $(, $k:expr => $v:expr)* $(,)?) => {{
        use $crate::metrics::prelude::*;
        $crate::metrics::with_client(|client| {
            client.send_metric(
                client.time_with_tags($id, $value)
                    $(.with_tag($k, $v))*
            );
        })
    }};
}
