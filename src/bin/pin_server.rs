use std::collections::HashMap;
use std::process;
use std::sync::Arc;
use std::time::SystemTime;

use iron::prelude::*;
use iron::{status, typemap, BeforeMiddleware};
use logger::Logger;
use tracing::{error, info, warn};

use pin_oracle::error::Error as OracleError;
use pin_oracle::{logging, Author, Config, MemoryLedger, Oracle, TableSource};

type SharedOracle = Arc<Oracle<Box<dyn TableSource + Send + Sync>, MemoryLedger>>;

struct OracleKey;

impl typemap::Key for OracleKey { type Value = SharedOracle; }

struct OracleMiddleware {
    oracle: SharedOracle,
}

impl OracleMiddleware {
    fn new(oracle: SharedOracle) -> OracleMiddleware {
        OracleMiddleware {
            oracle: oracle
        }
    }
}

impl BeforeMiddleware for OracleMiddleware {
    fn before(&self, req: &mut Request) -> IronResult<()> {
        req.extensions.insert::<OracleKey>(self.oracle.clone());
        Ok(())
    }
}

fn query(req: &Request) -> HashMap<String, String> {
    req.url.clone()
        .into_generic_url()
        .query_pairs()
        .into_owned()
        .collect()
}

fn raw_pins(params: &HashMap<String, String>) -> Option<[i64; 3]> {
    let pin = |k: &str| params.get(k).and_then(|v| v.trim().parse::<i64>().ok());
    match (pin("pin0"), pin("pin1"), pin("pin2")) {
        (Some(p0), Some(p1), Some(p2)) => Some([p0, p1, p2]),
        _ => None,
    }
}

fn author(params: &HashMap<String, String>) -> Option<Author> {
    let id = params.get("author").and_then(|v| v.trim().parse::<u64>().ok())?;
    let name = params.get("name")
        .cloned()
        .unwrap_or_else(|| id.to_string());
    Some(Author { id: id, name: name })
}

fn failure(e: OracleError) -> Response {
    match e {
        OracleError::Fetch(ref cause) => {
            warn!(error = %cause, "lookup table unavailable");
            Response::with((status::ServiceUnavailable, "Lookup table temporarily unavailable, try again later"))
        }
        ref other => {
            error!(error = %other, "request failed");
            Response::with((status::InternalServerError, other.to_string()))
        }
    }
}

fn handle(req: &mut Request) -> IronResult<Response> {
    let oracle = match req.extensions.get::<OracleKey>() {
        Some(oracle) => oracle.clone(),
        None => return Ok(Response::with(status::InternalServerError)),
    };
    let params = query(req);
    let path = req.url.path();
    let route = path.first().cloned().unwrap_or("");

    let pins = match raw_pins(&params) {
        Some(pins) => pins,
        None => return Ok(Response::with((status::BadRequest, "expected pin0, pin1 and pin2"))),
    };

    let now = SystemTime::now();

    let result = match route {
        "claim" => {
            let author = match author(&params) {
                Some(author) => author,
                None => return Ok(Response::with((status::BadRequest, "expected author"))),
            };
            oracle.claim(pins, &author, now)
        }
        "recall" => oracle.recall(pins, now),
        _ => return Ok(Response::with(status::NotFound)),
    };

    match result {
        Ok(reply) => Ok(Response::with((status::Ok, reply.to_string()))),
        Err(e) => Ok(failure(e)),
    }
}

fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pin_server: {}", e);
            process::exit(2);
        }
    };
    logging::init(config.log_level);

    let source = match config.table_source() {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "no usable lookup table source");
            process::exit(2);
        }
    };
    let ledger = MemoryLedger::new(config.leaderboard_size);
    let oracle = Arc::new(Oracle::new(source, ledger, config.seeding, config.schedule));

    let (logger_before, logger_after) = Logger::new(None);

    let mut chain = Chain::new(handle);
    chain.link_before(logger_before);
    chain.link_before(OracleMiddleware::new(oracle));
    chain.link_after(logger_after);

    info!(addr = %config.listen, seeding = config.seeding.name(), "starting pin server");

    if let Err(e) = Iron::new(chain).http(config.listen.as_str()) {
        error!(error = %e, "server stopped");
        process::exit(1);
    }
}
