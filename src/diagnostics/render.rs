use crate::modem::engine::Response;
use crate::tracker::location::TrackerState;
use std::fmt::Write;

const STYLE: &str = "body{margin-top:50px;display:flex;flex-direction:column;padding:1rem;align-items:center}\
h1,h3{color:#2f2d2d;margin:1rem auto}\
a,a:active,a:hover,a:visited{text-decoration:none;font-size:32px;color:#15ad8f}\
p{font-size:1rem;color:#3a3838;margin:12px auto}\
button{padding:.5rem 1rem;outline:0;border-radius:5px;background-color:#0ba485;border:0;cursor:pointer;color:#fff;font-size:24px}";

// Shared page chrome: navigation on top, restart button at the bottom.
pub fn page(body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 1_024);
    html.push_str("<!DOCTYPE html><html>\n");
    html.push_str("<head><meta name='viewport' content='width=device-width, initial-scale=1.0' /><title>GPS TRACKER</title></head>\n");
    html.push_str("<body>\n<style>\n");
    html.push_str(STYLE);
    html.push_str("</style>\n");
    html.push_str("<h3><i>Tracker diagnostics</i></h3>\n");
    html.push_str("<div style='display: flex; gap: 1rem'><a href='/'>Home</a> <a href='/logs'>Serial logs</a></div>\n");
    if body.is_empty() {
        html.push_str("<p> NOTHING TO SHOW</p>");
    } else {
        html.push_str(body);
    }
    html.push_str("<a href='/restart'><button>RESTART</button></a>\n");
    html.push_str("</body>\n</html>\n");
    html
}

pub fn status_body(state: &TrackerState) -> String {
    let mut body = String::from("<h1>GPS COORDS</h1>\n");
    let current = state.current;
    // (0, 0) doubles as "no fix yet".
    if current.latitude != 0.0 && current.longitude != 0.0 {
        let _ = writeln!(body, "<p>Current Latitude: {:.9}</p>", current.latitude);
        let _ = writeln!(body, "<p>Current Longitude: {:.9}</p>", current.longitude);
    }

    if state.updated {
        body.push_str("<div style=\"padding:4px;border: 1px solid green;word-wrap:break-word;\">");
        let _ = writeln!(
            body,
            "<p>Updated latitude FROM: {:.9} TO: {:.9}</p>",
            state.last_accepted.latitude, state.last_reported.latitude
        );
        let _ = writeln!(
            body,
            "<p>Updated longitude FROM: {:.9} TO: {:.9}</p>",
            state.last_accepted.longitude, state.last_reported.longitude
        );
        body.push_str("</div>\n");
    } else {
        body.push_str("<p> GPS location not updated</p>\n");
    }
    body
}

pub fn logs_body(response: Option<&Response>) -> String {
    let mut body = String::from("<h1>Serial logs</h1>\n");
    body.push_str("<div style=\"margin:8px 4px;border:1px solid red; padding: 4px\">\n");
    if let Some(response) = response {
        let _ = writeln!(
            body,
            "<p><b>{}</b> at {}</p>",
            escape_html(response.command()),
            response.received_at().format("%Y-%m-%d %H:%M:%S UTC")
        );
        if response.is_empty() {
            body.push_str("<p>(no reply)</p>");
        } else {
            let _ = write!(body, "<pre>{}</pre>", escape_html(&response.text()));
        }
        for fault in response.faults() {
            let _ = write!(body, "<p><i>{}</i></p>", escape_html(&fault.to_string()));
        }
    } else {
        body.push_str("<p></p>");
    }
    body.push_str("\n</div>\n");
    body
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '\0' => {}
            _ => escaped.push(c),
        }
    }
    escaped
}
