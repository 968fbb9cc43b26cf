//! Shared handler helpers.

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

/// Line-oriented success body: `OK` followed by one line per item.
pub fn ok_lines<I, S>(lines: I) -> Response
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = String::from("OK\n");
    for line in lines {
        body.push_str(line.as_ref());
        body.push('\n');
    }
    ([(CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
