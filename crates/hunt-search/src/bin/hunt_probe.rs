//! CLI tool to run a path or address search against the configured providers.
//!
//! Provider URLs and queue limits come from the `HUNT_*` environment variables.

use anyhow::bail;
use clap::Parser;
use hunt_search::{GeoPoint, SearchConfig, SearchService, SearchZone};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Search for named places along a path, or resolve an address
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path vertex as "lat,lon"; repeat for each point
    #[arg(long = "point", value_parser = parse_point)]
    points: Vec<GeoPoint>,

    /// Search radius around the path in kilometers
    #[arg(long, default_value_t = 2.0)]
    radius_km: f64,

    /// Optional GeoJSON polygon or feature limiting the search area
    #[arg(long)]
    zone: Option<String>,

    /// Free-text address to resolve instead of a path search
    #[arg(long)]
    address: Option<String>,

    /// Maximum number of address matches
    #[arg(long)]
    limit: Option<usize>,
}

fn parse_point(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got {raw:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    Ok(GeoPoint::new(lat, lon))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("hunt_search=debug".parse()?))
        .init();

    let args = Args::parse();
    let config = SearchConfig::from_env();
    let service = SearchService::from_config(&config);

    if let Some(address) = args.address.as_deref() {
        let matches = service.search_address(address, args.limit).await?;
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if args.points.is_empty() {
        bail!("nothing to search: pass --point at least once or --address");
    }

    let zone = match args.zone.as_deref() {
        Some(raw) => Some(SearchZone::from_geojson(&serde_json::from_str(raw)?)),
        None => None,
    };

    tracing::info!(
        points = args.points.len(),
        radius_km = args.radius_km,
        overpass = %config.overpass_url,
        "Searching along path"
    );
    let results = service
        .search_locations_near_path(&args.points, args.radius_km, zone.as_ref())
        .await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
