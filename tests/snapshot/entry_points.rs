//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use std::rc::Rc;

    use freeze_dry::parsers::html::parse_html;
    use freeze_dry::utils::url::Url;
    use freeze_dry::{FreezeDry, FreezeDryOptions, Resource};

    use crate::support::{attr_value, MemoryFetcher};

    fn site() -> MemoryFetcher {
        MemoryFetcher::new()
            .with(
                "https://example.com/",
                "text/html",
                r#"<title>home</title><img src="logo.png">"#,
            )
            .with("https://example.com/logo.png", "image/png", b"logo")
            .with(
                "https://example.com/latin1.html",
                "text/html; charset=windows-1252",
                b"<p>caf\xe9</p>",
            )
    }

    #[tokio::test]
    async fn freeze_url() {
        let options = FreezeDryOptions {
            set_content_security_policy: false,
            ..Default::default()
        };

        let html = FreezeDry::new(options)
            .fetch_resource(site())
            .freeze_url("https://example.com/")
            .await
            .unwrap();

        assert!(attr_value(&html, "img", "src").starts_with("data:image/png;base64,"));
        assert_eq!(attr_value(&html, "link", "rel"), "original");
        assert_eq!(attr_value(&html, "link", "href"), "https://example.com/");
        assert!(html.contains("Memento-Datetime"));
    }

    #[tokio::test]
    async fn freeze_url_reencodes_as_utf8() {
        let html = FreezeDry::new(FreezeDryOptions::default())
            .fetch_resource(site())
            .freeze_url("https://example.com/latin1.html")
            .await
            .unwrap();

        assert!(html.contains("<p>café</p>"));
        assert_eq!(attr_value(&html, "meta", "charset"), "utf-8");
    }

    #[tokio::test]
    async fn doc_url_overrides_where_the_page_came_from() {
        let options = FreezeDryOptions {
            add_metadata: false,
            doc_url: Some("https://example.com/".to_string()),
            ..Default::default()
        };

        let html = FreezeDry::new(options)
            .fetch_resource(MemoryFetcher::new().with(
                "https://example.com/logo.png",
                "image/png",
                b"logo",
            ))
            .freeze_html(r#"<a href="about.html">about</a><img src="logo.png">"#)
            .await
            .unwrap();

        assert_eq!(attr_value(&html, "a", "href"), "https://example.com/about.html");
        assert!(attr_value(&html, "img", "src").starts_with("data:"));
    }

    #[tokio::test]
    async fn freeze_dom() {
        let options = FreezeDryOptions {
            add_metadata: false,
            doc_url: Some("https://example.com/".to_string()),
            ..Default::default()
        };

        let html = FreezeDry::new(options)
            .fetch_resource(site())
            .freeze_dom(parse_html(r#"<img src="logo.png">"#))
            .await
            .unwrap();

        assert!(attr_value(&html, "img", "src").starts_with("data:image/png"));
    }

    #[tokio::test]
    async fn freeze_resource() {
        let root = Resource::from_html(
            r#"<img src="logo.png">"#,
            Url::parse("https://example.com/").unwrap(),
        );

        let html = FreezeDry::new(FreezeDryOptions::default())
            .fetch_resource(site())
            .freeze_resource(Rc::new(root))
            .await
            .unwrap();

        assert!(attr_value(&html, "img", "src").starts_with("data:image/png"));
    }

    #[tokio::test]
    async fn options_from_toml() {
        let options = FreezeDryOptions::from_toml_str(
            r#"
            add_metadata = false
            remember_original_urls = false
            charset_declaration = ""
            doc_url = "https://example.com/"
            "#,
        )
        .unwrap();
        assert!(!options.keep_original_attributes);
        assert_eq!(options.charset_declaration, None);

        let html = FreezeDry::new(options)
            .fetch_resource(site())
            .freeze_html(r#"<img src="logo.png">"#)
            .await
            .unwrap();

        assert!(!html.contains("data-original-src"));
        assert!(!html.contains("charset"));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use freeze_dry::core::FetchError;
    use freeze_dry::{FreezeDry, FreezeDryError, FreezeDryOptions};
    use markup5ever_rcdom::RcDom;

    use crate::support::MemoryFetcher;

    fn freeze_dry() -> FreezeDry {
        FreezeDry::new(FreezeDryOptions::default()).fetch_resource(
            MemoryFetcher::new().with("https://example.com/logo.png", "image/png", b"logo"),
        )
    }

    #[tokio::test]
    async fn malformed_url() {
        let result = freeze_dry().freeze_url("not a url").await;
        assert!(matches!(result, Err(FreezeDryError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn url_of_an_image() {
        let result = freeze_dry()
            .freeze_url("https://example.com/logo.png")
            .await;
        assert!(matches!(
            result,
            Err(FreezeDryError::UnsupportedMediaType(media_type)) if media_type == "image/png"
        ));
    }

    #[tokio::test]
    async fn url_that_does_not_exist() {
        let result = freeze_dry()
            .freeze_url("https://example.com/missing.html")
            .await;
        assert!(matches!(
            result,
            Err(FreezeDryError::Fetch(FetchError::Status { status: 404, .. }))
        ));
    }

    #[tokio::test]
    async fn empty_dom() {
        let result = freeze_dry().freeze_dom(RcDom::default()).await;
        assert!(matches!(result, Err(FreezeDryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn malformed_doc_url() {
        let options = FreezeDryOptions {
            doc_url: Some("::".to_string()),
            ..Default::default()
        };
        let result = FreezeDry::new(options).freeze_html("<p>x</p>").await;
        assert!(matches!(result, Err(FreezeDryError::InvalidUrl { .. })));
    }

    #[test]
    fn malformed_toml() {
        let result = FreezeDryOptions::from_toml_str("timeout_ms = \"soon\"");
        assert!(matches!(result, Err(FreezeDryError::Config(_))));
    }
}
