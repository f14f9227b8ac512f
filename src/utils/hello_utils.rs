#![forbid(unsafe_code)]

use path_absolutize::Absolutize;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use chrono::{Local, NaiveDate};

use poem::{Endpoint, IntoResponse, Request, Response};

use log::{debug, error, info, warn, LevelFilter};

// ***************************************************************************
// GENERAL PUBLIC FUNCTIONS
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_absolute_path:
// ---------------------------------------------------------------------------
/** Replace tilde (~) and environment variable values in a path name and
 * then construct the absolute path name.  The difference between
 * absolutize and standard canonicalize methods is that absolutize does not
 * care about whether the file exists and what the file really is.
 */
pub fn get_absolute_path(path: &str) -> String {
    // Replace ~ and environment variable values if possible.
    // On error, return the string version of the original path.
    let s = match shellexpand::full(path) {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };

    // Convert to absolute path if necessary.
    // Return original input on error.
    let p = Path::new(s.deref());
    let p1 = match p.absolutize() {
        Ok(x) => x,
        Err(_) => return path.to_owned(),
    };
    let p2 = match p1.to_str() {
        Some(x) => x,
        None => return path.to_owned(),
    };

    p2.to_owned()
}

// ***************************************************************************
//                                  Clock
// ***************************************************************************
/** Source of the current calendar date. */
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/** The host's local date. */
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

// ***************************************************************************
//                                  Traits
// ***************************************************************************
pub trait RequestDebug {
    type Req;
    fn get_request_info(&self) -> String;
}

// ---------------------------------------------------------------------------
// request_context:
// ---------------------------------------------------------------------------
/** One line identifying a request in the log: who sent it, how and where. */
pub fn request_context(http_req: &Request) -> String {
    format!("Request from: {}, Method: {}, URI: {}",
            http_req.remote_addr(), http_req.method(), http_req.uri())
}

// ---------------------------------------------------------------------------
// log_request:
// ---------------------------------------------------------------------------
/** Middleware that logs every request on arrival and any server error or
 * routing failure on the way out.
 */
pub async fn log_request<E: Endpoint>(next: Arc<E>, http_req: Request) -> poem::Result<Response> {
    let ctx = request_context(&http_req);
    info!("{}", ctx);

    match next.call(http_req).await {
        Ok(resp) => {
            let resp = resp.into_response();
            if resp.status().is_server_error() {
                error!("{} -> {}", ctx, resp.status());
            }
            Ok(resp)
        }
        Err(e) => {
            warn!("{} -> {}", ctx, e);
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// debug_request:
// ---------------------------------------------------------------------------
// Dump http request information to the log.
pub fn debug_request(http_req: &Request, req: &impl RequestDebug) {
    // Check that debug or higher logging is in effect.
    let level = log::max_level();
    if level < LevelFilter::Debug {
        return;
    }

    // Accumulate the output.
    let mut s = "\n".to_string();

    // Restate the URI.
    let uri = http_req.uri();
    s += format!("  URI: {:?}\n", uri).as_str();

    // Accumulate the headers
    let it = http_req.headers().iter();
    for v in it {
         s += format!("  Header: {} = {:?} \n", v.0, v.1).as_str();
    };

    // Add the request's information.
    s += req.get_request_info().as_str();

    // Write the single log record.
    debug!("{}", s);
}
