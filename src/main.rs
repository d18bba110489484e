// src/main.rs

use std::net::{Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use rdcross::config::rules::RuleLine;
use rdcross::config::{parse_rule_line, Config, EgressConfig, IngressConfig, ProxyConfig};
use rdcross::context::AppContext;
use rdcross::dns::default_handler::DefaultHandler;
use rdcross::dns::fakeip_handler::FakeIpHandler;
use rdcross::dns::{DnsServer, Handler, SharedFakeIp};
use rdcross::egress::direct::DirectEgress;
use rdcross::egress::general::GeneralEgress;
use rdcross::egress::reject::RejectEgress;
use rdcross::egress::{Egress, EgressRegistry, GroupEgress};
use rdcross::fakeip::FakeIp;
use rdcross::geoip::{GeoIpLookup, NoGeoIp};
use rdcross::ingress::general::GeneralIngress;
use rdcross::ingress::tun::TunIngress;
use rdcross::ingress::Ingress;
use rdcross::process::NoProcessLookup;
use rdcross::proxy::none::NoneProxy;
use rdcross::proxy::shadowsocks::ShadowsocksProxy;
use rdcross::proxy::socks::SocksProxy;
use rdcross::proxy::{Proxy, ProxyMode};
use rdcross::router::rule::default::DefaultRule;
use rdcross::router::rule::domain::DomainRuleSet;
use rdcross::router::rule::geoip::GeoIpRuleSet;
use rdcross::router::rule::prgname::PrgNameRuleSet;
use rdcross::router::rule::prgpath::PrgPathRuleSet;
use rdcross::router::rule::route::RouteRuleSet;
use rdcross::router::rule::{self, Action, RuleSet, KIND_DOMAIN, KIND_GEOIP, KIND_PRGNAME, KIND_PRGPATH, KIND_ROUTE};
use rdcross::router::{DefaultRouter, Router};
use tokio::sync::Mutex;

type BoxError = Box<dyn std::error::Error>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "./config.yaml")]
    config: String,

    /// Raise log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Parse and validate the configuration, then exit without starting anything.
    #[arg(short = 't', long)]
    test: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), BoxError> {
    let config = Config::load(&args.config)?;
    init_tracing(args.verbose, &config.log.level);

    if args.test {
        println!("configuration OK: {}", args.config);
        return Ok(());
    }

    info!(path = %args.config, "configuration loaded");
    if config.geoip.path.is_some() {
        warn!("geoip.path is configured but MMDB lookup is not implemented in this build; GEOIP rules will never match");
    }

    let geoip: Arc<dyn GeoIpLookup> = Arc::new(NoGeoIp);
    let process_lookup = Arc::new(NoProcessLookup);

    let egress_registry = Arc::new(build_egress_registry(&config)?);
    let router: Arc<dyn Router> = Arc::new(build_router(&config.rule, geoip.clone())?);

    let dns_fakeip = build_dns_fakeip(&config)?;
    let dns_handler = build_dns_handler(&config, dns_fakeip.clone())?;

    if config.dns.enable {
        let listen: SocketAddr = config.dns.listen.parse()?;
        let handler = dns_handler
            .clone()
            .expect("dns.enable implies build_dns_handler returned a handler");
        let server = DnsServer::bind(listen, handler).await?;
        tokio::spawn(server.serve());
        info!(listen = %config.dns.listen, "dns server listening");
    }

    if let Some(listen) = &config.debug.listen {
        let addr: SocketAddr = listen.parse()?;
        tokio::spawn(rdcross::debug_http::serve(addr));
        info!(listen = %listen, "debug http endpoint listening");
    }

    let ingresses = build_ingresses(&config, router.clone(), egress_registry.clone(), dns_fakeip.clone(), dns_handler).await?;
    if ingresses.is_empty() {
        warn!("no ingress configured, nothing to serve");
    }

    let ctx = AppContext::new(router, egress_registry, ingresses, geoip, process_lookup, dns_fakeip);

    let run_fut = ctx.run();
    tokio::pin!(run_fut);

    tokio::select! {
        result = &mut run_fut => return result.map_err(Into::into),
        _ = shutdown_signal() => {}
    }

    info!("shutdown signal received, waiting up to 5s for ingresses to finish");
    match tokio::time::timeout(Duration::from_secs(5), run_fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            warn!("ingresses did not finish within the shutdown grace period");
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8, config_level: &str) {
    let level = match verbose {
        0 => config_level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_new(format!("rdcross={level}")).unwrap_or_else(|_| EnvFilter::new("rdcross=info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();
}

fn build_proxy(mode: ProxyMode, cfg: &ProxyConfig) -> Result<Arc<dyn Proxy>, BoxError> {
    Ok(match cfg {
        ProxyConfig::None => Arc::new(NoneProxy::new(mode)),
        ProxyConfig::Socks => Arc::new(SocksProxy::new(mode)),
        ProxyConfig::Shadowsocks { cipher, password } => Arc::new(ShadowsocksProxy::new(mode, cipher, password)?),
    })
}

fn build_egress_registry(config: &Config) -> Result<EgressRegistry, BoxError> {
    let mut registry = EgressRegistry::new();
    for egress in &config.egress {
        let built: Arc<dyn Egress> = match egress {
            EgressConfig::Direct { name } => Arc::new(DirectEgress::new(name.clone())),
            EgressConfig::Reject { name } => Arc::new(RejectEgress::new(name.clone())),
            EgressConfig::General { name, server, proxy } => {
                let addr: SocketAddr = server.parse()?;
                let proxy = build_proxy(ProxyMode::Client, proxy)?;
                Arc::new(GeneralEgress::new(name.clone(), addr, proxy))
            }
        };
        registry.register(built);
    }

    for group in &config.egress_group {
        let Some(first) = group.member.first() else {
            continue;
        };
        let Some(member) = registry.get(first) else {
            warn!(group = %group.name, member = %first, "egress group names an unknown member, skipping");
            continue;
        };
        registry.register(Arc::new(GroupEgress::new(group.name.clone(), member)));
    }

    Ok(registry)
}

/// Builds the rule engine: one [`RuleSet`] per kind accumulated from every
/// matching config line, ordered by the configured `PRIOR` line (or the
/// default order) and capped by a `DEFAULT` fallback.
fn build_router(lines: &[String], geoip: Arc<dyn GeoIpLookup>) -> Result<DefaultRouter, BoxError> {
    let mut route = RouteRuleSet::new();
    let mut domain = DomainRuleSet::new();
    let mut geoip_set = GeoIpRuleSet::new(geoip);
    let mut prgname = PrgNameRuleSet::new();
    let mut prgpath = PrgPathRuleSet::new();
    let mut default_action: Option<Action> = None;
    let mut priority: Option<Vec<String>> = None;

    for line in lines {
        match parse_rule_line(line)? {
            RuleLine::Match {
                kind,
                pattern,
                egress,
                policy,
            } => {
                let action = Action::new(egress, policy);
                match kind.as_str() {
                    KIND_ROUTE => route.add(pattern.parse()?, action),
                    KIND_DOMAIN => domain.add(&pattern, action),
                    KIND_GEOIP => geoip_set.add(pattern, action),
                    KIND_PRGNAME => prgname.add(pattern, action),
                    KIND_PRGPATH => prgpath.add(pattern, action),
                    other => unreachable!("parse_rule_line only returns known kinds, got {other}"),
                }
            }
            RuleLine::Default { egress, policy } => default_action = Some(Action::new(egress, policy)),
            RuleLine::Priority(kinds) => priority = Some(kinds),
        }
    }

    let mut by_kind: Vec<(&'static str, Box<dyn RuleSet>)> = vec![
        (KIND_ROUTE, Box::new(route)),
        (KIND_PRGPATH, Box::new(prgpath)),
        (KIND_PRGNAME, Box::new(prgname)),
        (KIND_DOMAIN, Box::new(domain)),
        (KIND_GEOIP, Box::new(geoip_set)),
    ];

    let order = priority.unwrap_or_else(|| rule::default_priority().into_iter().map(String::from).collect());
    let mut ordered = Vec::new();
    for kind in &order {
        if let Some(pos) = by_kind.iter().position(|(k, _)| *k == kind.as_str()) {
            ordered.push(by_kind.remove(pos).1);
        }
    }

    let default: Box<dyn RuleSet> = Box::new(default_action.map(DefaultRule::new).unwrap_or_default());
    Ok(DefaultRouter::new(ordered, default))
}

fn build_dns_fakeip(config: &Config) -> Result<Option<SharedFakeIp>, BoxError> {
    if !config.dns.enable || !config.dns.fakeip.enable {
        return Ok(None);
    }
    let cidr: ipnet::Ipv4Net = config.dns.fakeip.cidr.parse()?;
    Ok(Some(Arc::new(Mutex::new(FakeIp::new(cidr)))))
}

fn build_dns_handler(config: &Config, fakeip: Option<SharedFakeIp>) -> Result<Option<Arc<dyn Handler>>, BoxError> {
    if !config.dns.enable {
        return Ok(None);
    }
    let upstreams: Vec<SocketAddr> = config
        .dns
        .upstream
        .iter()
        .map(|s| s.parse())
        .collect::<Result<_, _>>()?;
    let default: Arc<dyn Handler> = Arc::new(DefaultHandler::new(upstreams));
    let handler: Arc<dyn Handler> = match fakeip {
        Some(pool) => Arc::new(FakeIpHandler::new(pool, default, Duration::from_secs(config.dns.fakeip.ttl))),
        None => default,
    };
    Ok(Some(handler))
}

async fn build_ingresses(
    config: &Config,
    router: Arc<dyn Router>,
    egress_registry: Arc<EgressRegistry>,
    dns_fakeip: Option<SharedFakeIp>,
    dns_handler: Option<Arc<dyn Handler>>,
) -> Result<Vec<Arc<dyn Ingress>>, BoxError> {
    let mut ingresses: Vec<Arc<dyn Ingress>> = Vec::new();
    for ingress in &config.ingress {
        match ingress {
            IngressConfig::General { name, listen, proxy } => {
                let proxy = build_proxy(ProxyMode::Server, proxy)?;
                ingresses.push(Arc::new(GeneralIngress::new(
                    name.clone(),
                    listen.clone(),
                    proxy,
                    router.clone(),
                    egress_registry.clone(),
                )));
            }
            IngressConfig::Tun {
                name,
                device,
                address,
                netmask,
                mtu,
                packet_file,
                mapped_cidr,
            } => {
                let address: Ipv4Addr = address.parse()?;
                let netmask: Ipv4Addr = netmask.parse()?;
                let mtu = mtu.unwrap_or(1500);
                let mapped_cidr: ipnet::Ipv4Net = mapped_cidr.parse()?;
                let tun = TunIngress::new(
                    name.clone(),
                    device.clone(),
                    address,
                    netmask,
                    mtu,
                    packet_file.clone(),
                    mapped_cidr,
                    dns_fakeip.clone(),
                    dns_handler.clone(),
                    router.clone(),
                    egress_registry.clone(),
                )
                .await?;
                ingresses.push(Arc::new(tun));
            }
        }
    }
    Ok(ingresses)
}

/// Waits for Ctrl-C or, on Unix, SIGTERM. Note that the run-loop's ingress
/// tasks live in a `JoinSet` owned by `AppContext::run`'s future: once this
/// resolves, `main`'s grace-period timeout still polls that same future (via
/// `tokio::pin!`), so in-flight connections get up to 5s to wind down before
/// the process exits and the `JoinSet` drop aborts whatever remains.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
