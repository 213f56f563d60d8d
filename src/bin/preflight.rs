use geodata_catalog::infra::config;
use geodata_catalog::{GdalSrsInfo, Storage};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--bootstrap]\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL\n\
         Optional:\n\
           GDALSRSINFO_PATH, DATABASE_MAX_CONNECTIONS\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let bootstrap = args.iter().any(|a| a == "--bootstrap");

    // Force-read config (nice error messages if missing)
    let database_url = config::database_url()?;
    let max_connections = config::database_max_connections()?;
    let gdal = GdalSrsInfo::from_env();

    println!("> Preflight:");
    println!("  GDALSRSINFO_PATH={}", gdal.program());
    println!("  DATABASE_MAX_CONNECTIONS={}", max_connections);

    // Basic database connectivity
    let storage = Storage::connect(&database_url, max_connections.min(2))
        .await
        .map_err(|e| anyhow::anyhow!("Database is not reachable: {}", e))?;
    storage.ping().await?;
    println!("  Database is reachable.");

    if bootstrap {
        storage.bootstrap().await?;
        println!("  Schema bootstrapped (postgis, geodata, geodata.layers).");
    }

    // PostGIS must be installed for geometry columns and UpdateGeometrySRID
    let postgis = storage
        .postgis_version()
        .await
        .map_err(|e| anyhow::anyhow!("PostGIS is not available: {} (re-run with --bootstrap?)", e))?;
    println!("  PostGIS: {}", postgis);

    // Catalog
    match storage.list_layers(true).await {
        Ok(layers) => println!("  Catalog is readable ({} layers).", layers.len()),
        Err(e) => eprintln!("  Warning: catalog is not readable yet: {} (re-run with --bootstrap)", e),
    }

    // Projection resolution
    let version = gdal.version().await?;
    println!("  gdalsrsinfo: {}", version);

    println!("> Preflight OK.");
    Ok(())
}
