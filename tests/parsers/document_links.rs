//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use std::rc::Rc;

    use freeze_dry::parsers::html::{
        extract_links_from_dom, parse_html, rule, DocumentContext, SubresourceType,
    };
    use freeze_dry::utils::url::Url;
    use freeze_dry::{Anchor, Link};

    fn links_of(html: &str) -> Vec<Rc<Link>> {
        let dom = parse_html(html);
        let context = Rc::new(DocumentContext::new(
            dom.document.clone(),
            Url::parse("https://example.com/dir/page.html").unwrap(),
        ));
        extract_links_from_dom(&context)
    }

    fn by_rule(links: &[Rc<Link>], name: &str) -> Rc<Link> {
        links
            .iter()
            .find(|link| link.rule_name() == Some(name))
            .cloned()
            .unwrap_or_else(|| panic!("no link from rule {name}"))
    }

    fn absolute(link: &Link) -> Option<String> {
        link.absolute_target().map(|url| url.to_string())
    }

    #[test]
    fn relative_links_resolve_against_the_document() {
        let links = links_of(r#"<img src="../a.png">"#);
        assert_eq!(links.len(), 1);
        assert_eq!(absolute(&links[0]).as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn base_element_changes_resolution() {
        let links = links_of(
            r#"<html manifest="app.appcache"><head><base href="https://cdn.example.com/assets/"></head><img src="a.png"></html>"#,
        );

        assert_eq!(
            absolute(&by_rule(&links, "image-src")).as_deref(),
            Some("https://cdn.example.com/assets/a.png")
        );
        // manifest ignores <base>
        assert_eq!(
            absolute(&by_rule(&links, "manifest")).as_deref(),
            Some("https://example.com/dir/app.appcache")
        );
    }

    #[test]
    fn object_data_resolves_against_codebase() {
        let links = links_of(r#"<object codebase="/code/" data="img.png"></object>"#);
        assert_eq!(
            absolute(&by_rule(&links, "data")).as_deref(),
            Some("https://example.com/code/img.png")
        );
        assert!(!by_rule(&links, "codebase").is_subresource());
    }

    #[test]
    fn microdata_urls_must_be_absolute() {
        let links = links_of(r#"<span itemprop="name https://schema.org/color">x</span>"#);
        assert_eq!(links.len(), 2);
        assert_eq!(absolute(&links[0]), None);
        assert_eq!(
            absolute(&links[1]).as_deref(),
            Some("https://schema.org/color")
        );
    }

    #[test]
    fn subresource_types_follow_the_element() {
        let links = links_of(concat!(
            r#"<link rel="stylesheet" href="s.css">"#,
            r#"<link rel="shortcut icon" href="favicon.ico">"#,
            r#"<link rel="alternate" href="feed.xml">"#,
            r#"<iframe src="frame.html"></iframe>"#,
            r#"<video poster="poster.jpg" src="movie.mp4"></video>"#,
            r#"<audio src="sound.ogg"></audio>"#,
            r#"<input type="image" src="button.png">"#,
            r#"<input type="text" src="ignored.png">"#,
        ));

        let kinds: Vec<(String, Option<SubresourceType>)> = links
            .iter()
            .map(|link| (link.target(), link.subresource_type()))
            .collect();
        for expected in [
            ("s.css", Some(SubresourceType::Style)),
            ("favicon.ico", Some(SubresourceType::Image)),
            ("frame.html", Some(SubresourceType::Document)),
            ("poster.jpg", Some(SubresourceType::Image)),
            ("movie.mp4", Some(SubresourceType::Video)),
            ("sound.ogg", Some(SubresourceType::Audio)),
            ("button.png", Some(SubresourceType::Image)),
        ] {
            assert!(
                kinds.contains(&(expected.0.to_string(), expected.1)),
                "{expected:?} missing from {kinds:?}"
            );
        }

        let feed = links.iter().find(|l| l.target() == "feed.xml").unwrap();
        assert!(!feed.is_subresource());
        assert!(links.iter().all(|l| l.target() != "ignored.png"));
    }

    #[test]
    fn meta_refresh_is_a_navigation_link() {
        let links = links_of(r#"<meta http-equiv="Refresh" content="5; url=next.html">"#);
        let refresh = by_rule(&links, "meta-refresh");
        assert_eq!(refresh.target(), "next.html");
        assert!(!refresh.is_subresource());
        assert_eq!(
            absolute(&refresh).as_deref(),
            Some("https://example.com/dir/next.html")
        );
        assert_eq!(refresh.from().range(), 7..16);
    }

    #[test]
    fn attribute_links_come_before_style_links() {
        let links = links_of(concat!(
            r#"<style>a { background: url(element.png) }</style>"#,
            r#"<div style="background: url(attribute.png)"></div>"#,
            r#"<img src="img.png">"#,
        ));

        let targets: Vec<String> = links.iter().map(|l| l.target()).collect();
        assert_eq!(targets, vec!["img.png", "attribute.png", "element.png"]);

        assert!(matches!(
            links[0].from(),
            Anchor::Attribute {
                attribute: "src",
                ..
            }
        ));
        assert!(matches!(links[1].from(), Anchor::StyleAttribute { .. }));
        assert!(matches!(links[2].from(), Anchor::StyleElement { .. }));
        assert_eq!(links[1].attribute_name(), Some("style"));
        assert!(links.iter().all(|link| link.is_subresource()));
    }

    #[test]
    fn links_write_through_to_the_dom() {
        let dom = parse_html(r#"<a ping="one two" href="x.html">x</a>"#);
        let context = Rc::new(DocumentContext::new(
            dom.document.clone(),
            Url::parse("https://example.com/").unwrap(),
        ));
        let links = extract_links_from_dom(&context);

        let ping: Vec<&Rc<Link>> = links
            .iter()
            .filter(|link| link.rule_name() == Some("ping"))
            .collect();
        assert_eq!(ping.len(), 2);
        ping[1].set_target("https://example.com/two");
        assert_eq!(ping[0].target(), "one");

        let refreshed = extract_links_from_dom(&context);
        let targets: Vec<String> = refreshed
            .iter()
            .filter(|link| link.rule_name() == Some("ping"))
            .map(|link| link.target())
            .collect();
        assert_eq!(targets, vec!["one", "https://example.com/two"]);
    }

    #[test]
    fn empty_attributes_yield_no_links() {
        assert!(links_of(r#"<img src="  "><a href="">x</a>"#).is_empty());
    }

    #[test]
    fn registry_lookup() {
        let srcset = rule("srcset").unwrap();
        assert!(srcset.is_subresource);
        assert_eq!(srcset.subresource_type, Some(SubresourceType::Image));
        assert!(rule("no-such-rule").is_none());
    }
}
