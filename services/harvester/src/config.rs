use clap::{Arg, ArgAction, Command};

/// Populate the routing store from one or more routing-configuration
/// documents and their referenced FDSNWS station inventories.
#[derive(Debug, Clone)]
pub struct Config {
    pub routing_configs: Vec<String>,
    pub no_routes: bool,
    pub no_vnetworks: bool,
    pub truncate_hours: Option<i64>,
    pub force_restricted: bool,
    pub database_url: String,
    pub pid_file: String,
}

impl Config {
    pub fn parse() -> Self {
        let matches = Command::new("EIDA Routing Harvester")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Populates the routing store from routing-configuration documents")
            .arg(
                Arg::new("routing_config")
                    .help("URL (http://, https:// or file://) of a routing-configuration document")
                    .value_name("url")
                    .action(ArgAction::Append)
                    .required(true),
            )
            .arg(
                Arg::new("no_routes")
                    .help("Skip harvesting <route> elements")
                    .long("no-routes")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("no_vnetworks")
                    .help("Skip harvesting <vnetwork> elements")
                    .long("no-vnetworks")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("truncate_hours")
                    .help("Delete rows not seen since this many hours ago")
                    .long("truncate-hours")
                    .value_parser(clap::value_parser!(i64)),
            )
            .arg(
                Arg::new("no_force_restricted")
                    .help("Use each route's configured endpoint URL as-is, without rewriting the method token for restricted channels")
                    .long("no-force-restricted")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("database_url")
                    .long("database-url")
                    .env("DATABASE_URL")
                    .required(true),
            )
            .arg(
                Arg::new("pid_file")
                    .long("pid-file")
                    .env("PID_FILE")
                    .default_value("/tmp/eida-harvester.pid"),
            )
            .get_matches();

        Self {
            routing_configs: matches
                .get_many::<String>("routing_config")
                .expect("required")
                .cloned()
                .collect(),
            no_routes: matches.get_flag("no_routes"),
            no_vnetworks: matches.get_flag("no_vnetworks"),
            truncate_hours: matches.get_one::<i64>("truncate_hours").copied(),
            force_restricted: !matches.get_flag("no_force_restricted"),
            database_url: matches.get_one::<String>("database_url").expect("required").clone(),
            pid_file: matches.get_one::<String>("pid_file").expect("has default").clone(),
        }
    }
}
