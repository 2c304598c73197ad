//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use base64::{prelude::BASE64_STANDARD, Engine};
    use chrono::{TimeZone, Utc};
    use freeze_dry::parsers::html::DEFAULT_CONTENT_SECURITY_POLICY;
    use freeze_dry::{freeze_dry, FreezeDry, FreezeDryOptions};
    use sha2::{Digest, Sha256};

    use crate::support::{
        attr_value, attr_values, decode_data_url, first_quoted_data_url, init_tracing, options,
        MemoryFetcher,
    };

    fn site() -> MemoryFetcher {
        MemoryFetcher::new()
            .with("https://example.com/a.png", "image/png", b"a-png")
            .with("https://example.com/b.png", "image/png", b"b-png")
            .with(
                "https://example.com/style.css",
                "text/css",
                "body { background: url(bg.png) }",
            )
            .with("https://example.com/bg.png", "image/png", b"bg-png")
            .with("https://example.com/imported.css", "text/css", "p { color: red }")
            .with(
                "https://example.com/frame.html",
                "text/html",
                r#"<p>framed</p><img src="a.png"><a href="other.html">other</a>"#,
            )
            .with(
                "https://example.com/sprite.svg",
                "image/svg+xml",
                r#"<svg xmlns="http://www.w3.org/2000/svg"></svg>"#,
            )
    }

    #[tokio::test]
    async fn images_are_inlined() {
        init_tracing();
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(r#"<img src="a.png">"#)
            .await
            .unwrap();

        assert_eq!(
            attr_value(&html, "img", "src"),
            format!("data:image/png;base64,{}", BASE64_STANDARD.encode(b"a-png"))
        );
        assert_eq!(attr_value(&html, "img", "data-original-src"), "a.png");
    }

    #[tokio::test]
    async fn original_attributes_can_be_dropped() {
        let options = FreezeDryOptions {
            keep_original_attributes: false,
            ..options()
        };
        let html = FreezeDry::new(options)
            .fetch_resource(site())
            .freeze_html(r#"<img src="a.png" srcset="a.png 1x, b.png 2x">"#)
            .await
            .unwrap();

        assert!(attr_value(&html, "img", "src").starts_with("data:"));
        assert!(!html.contains("data-original-"));
    }

    #[tokio::test]
    async fn srcset_tokens_are_inlined_separately() {
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(r#"<img srcset="a.png 1x, b.png 2x">"#)
            .await
            .unwrap();

        let srcset = attr_value(&html, "img", "srcset");
        let a = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(b"a-png"));
        let b = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(b"b-png"));
        assert_eq!(srcset, format!("{a} 1x, {b} 2x"));
        assert_eq!(
            attr_value(&html, "img", "data-original-srcset"),
            "a.png 1x, b.png 2x"
        );
    }

    #[tokio::test]
    async fn stylesheets_are_inlined_recursively() {
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(concat!(
                r#"<link rel="stylesheet" href="style.css">"#,
                r#"<style>@import "imported.css";</style>"#,
                r#"<div style="background-image: url('a.png')"></div>"#,
            ))
            .await
            .unwrap();

        let css = decode_data_url(&attr_value(&html, "link", "href"));
        assert!(css.starts_with(r#"body { background: url("data:image/png;base64,"#));
        assert!(!css.contains("bg.png"));

        assert!(html.contains(r#"<style>@import "data:text/css;charset=utf-8;base64,"#));
        assert!(attr_value(&html, "div", "style")
            .starts_with(r#"background-image: url("data:image/png;base64,"#));
        assert_eq!(
            attr_value(&html, "div", "data-original-style"),
            "background-image: url('a.png')"
        );
    }

    #[tokio::test]
    async fn frames_are_snapshotted_as_documents() {
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(r#"<iframe src="frame.html"></iframe>"#)
            .await
            .unwrap();

        let src = attr_value(&html, "iframe", "src");
        assert!(src.starts_with("data:text/html;charset=utf-8;base64,"));

        let frame = decode_data_url(&src);
        assert!(frame.contains("<p>framed</p>"));
        assert!(attr_value(&frame, "img", "src").starts_with("data:image/png;base64,"));
        assert_eq!(
            attr_value(&frame, "a", "href"),
            "https://example.com/other.html"
        );
        // metadata only goes into the top document
        assert!(!frame.contains("Content-Security-Policy"));
    }

    #[tokio::test]
    async fn fragments_survive_inlining() {
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(r#"<img src="sprite.svg#icon">"#)
            .await
            .unwrap();

        let src = attr_value(&html, "img", "src");
        assert!(src.starts_with("data:image/svg+xml;base64,"));
        assert!(src.ends_with("#icon"));
    }

    #[tokio::test]
    async fn each_url_is_fetched_once() {
        let fetcher = site();
        let requests = fetcher.requests();

        let html = FreezeDry::new(options())
            .fetch_resource(fetcher)
            .freeze_html(r#"<img src="a.png"><img src="a.png#again"><img src="./a.png">"#)
            .await
            .unwrap();

        assert_eq!(*requests.borrow(), vec!["https://example.com/a.png"]);
        assert!(attr_values(&html, "img", "src")
            .iter()
            .all(|src| src.starts_with("data:image/png")));
    }

    #[tokio::test]
    async fn failed_fetches_leave_links_alone() {
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(r#"<img src="missing.png"><img src="a.png">"#)
            .await
            .unwrap();

        let srcs = attr_values(&html, "img", "src");
        assert_eq!(srcs[0], "missing.png");
        assert!(srcs[1].starts_with("data:"));
    }

    #[tokio::test]
    async fn references_into_the_same_resource_are_left_alone() {
        let fetcher = site();
        let requests = fetcher.requests();
        let style = r#"<style>rect { filter: url(#blur) } a { background: url("") }</style>"#;

        let html = FreezeDry::new(options())
            .fetch_resource(fetcher)
            .freeze_html(&format!(r#"{style}<img src="a.png">"#))
            .await
            .unwrap();

        assert!(html.contains(style));
        assert_eq!(*requests.borrow(), vec!["https://example.com/a.png"]);
    }

    #[tokio::test]
    async fn imports_in_style_attributes_are_not_fetched() {
        let fetcher = site();
        let requests = fetcher.requests();

        let html = FreezeDry::new(options())
            .fetch_resource(fetcher)
            .freeze_html(r#"<div style="@import url(style.css); color: red"></div>"#)
            .await
            .unwrap();

        assert_eq!(
            attr_value(&html, "div", "style"),
            "@import url(style.css); color: red"
        );
        assert!(requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn integrity_is_checked_and_then_dropped() {
        let css = "body { background: url(bg.png) }";
        let integrity = format!("sha256-{}", BASE64_STANDARD.encode(Sha256::digest(css)));

        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(&format!(
                r#"<link rel="stylesheet" href="style.css" integrity="{integrity}">"#
            ))
            .await
            .unwrap();
        assert!(attr_value(&html, "link", "href").starts_with("data:text/css"));
        assert!(attr_values(&html, "link", "integrity").is_empty());

        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(
                r#"<link rel="stylesheet" href="style.css" integrity="sha256-bm9wZQ==">"#,
            )
            .await
            .unwrap();
        assert_eq!(attr_value(&html, "link", "href"), "style.css");
        assert_eq!(attr_value(&html, "link", "integrity"), "sha256-bm9wZQ==");
    }

    #[tokio::test]
    async fn image_data_urls_are_kept_verbatim() {
        let fetcher = site();
        let requests = fetcher.requests();
        let data_url = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";

        let html = FreezeDry::new(options())
            .fetch_resource(fetcher)
            .freeze_html(&format!(r#"<img src="{data_url}">"#))
            .await
            .unwrap();

        assert_eq!(attr_value(&html, "img", "src"), data_url);
        assert!(attr_values(&html, "img", "data-original-src").is_empty());
        assert!(requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn stylesheet_data_urls_are_processed() {
        let sheet = format!(
            "data:text/css;base64,{}",
            BASE64_STANDARD.encode("a { background: url(https://example.com/a.png) }")
        );

        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(&format!(r#"<link rel="stylesheet" href="{sheet}">"#))
            .await
            .unwrap();

        let css = decode_data_url(&attr_value(&html, "link", "href"));
        assert!(css.contains("data:image/png;base64,"));
        assert!(first_quoted_data_url(&css).starts_with("data:image/png"));
    }

    #[tokio::test]
    async fn scripts_and_handlers_are_removed() {
        let html = FreezeDry::new(options())
            .fetch_resource(site())
            .freeze_html(concat!(
                r#"<script src="app.js"></script><script>alert(1)</script>"#,
                r#"<button onclick="go()">go</button>"#,
                r#"<a href="javascript:go()">js</a><a href="about.html">about</a>"#,
            ))
            .await
            .unwrap();

        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("javascript:"));
        assert_eq!(
            attr_values(&html, "a", "href"),
            vec!["https://example.com/about.html"]
        );
    }

    #[tokio::test]
    async fn default_output_is_locked_down() {
        let html = freeze_dry("<title>t</title>", options()).await.unwrap();

        assert!(html.starts_with(&format!(
            r#"<html><head><meta charset="utf-8"><meta http-equiv="Content-Security-Policy" content="{DEFAULT_CONTENT_SECURITY_POLICY}"><title>t</title>"#
        )));
    }

    #[tokio::test]
    async fn metadata_is_added() {
        let options = FreezeDryOptions {
            add_metadata: true,
            set_content_security_policy: false,
            now: Some(Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).unwrap()),
            ..options()
        };

        let html = freeze_dry("<title>t</title>", options).await.unwrap();

        assert!(html.starts_with(concat!(
            r#"<html><head><meta charset="utf-8">"#,
            r#"<meta http-equiv="Memento-Datetime" content="Mon, 07 Jun 2021 08:09:10 GMT">"#,
            r#"<link rel="original" href="https://example.com/page.html">"#,
            "<title>t</title>",
        )));
    }

    #[tokio::test]
    async fn charset_declaration_can_be_removed() {
        let options = FreezeDryOptions {
            charset_declaration: None,
            set_content_security_policy: false,
            ..options()
        };

        let html = freeze_dry(r#"<meta charset="latin1"><title>t</title>"#, options)
            .await
            .unwrap();

        assert!(html.starts_with("<html><head><title>t</title>"));
    }

    #[tokio::test]
    async fn snapshotting_a_snapshot_changes_nothing() {
        let options = FreezeDryOptions {
            add_metadata: true,
            now: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            ..options()
        };
        let page = concat!(
            r#"<link rel="stylesheet" href="style.css">"#,
            r#"<style>@import "imported.css";</style>"#,
            r#"<img src="a.png" srcset="a.png 1x, b.png 2x">"#,
            r#"<iframe src="frame.html"></iframe>"#,
            r#"<a href="elsewhere.html" onclick="x()">elsewhere</a>"#,
        );

        let snapshot = FreezeDry::new(options).fetch_resource(site());
        let once = snapshot.freeze_html(page).await.unwrap();
        let twice = snapshot.freeze_html(&once).await.unwrap();

        assert_eq!(once, twice);
    }
}
