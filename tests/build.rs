use posthaste::build::{build_site, FEED_FILE};
use posthaste::config::{Config, PROJECT_FILE};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HOOKS: &str = "---
id: hooks
url: react-hooks
title: Hooks & friends
excerpt: All about hooks
date: 2019-02-01
author: david
tags: [react, js]
css: hooks.css
---
# Hooks

![a cat](./__STATIC__/img/cat.png)

Back to [the intro](../intro/).

<div class='note' style='margin-top: 1em'>Note<br></div>
";

const INTRO: &str = "---
id: intro
url: intro
title: Intro
excerpt: Where it starts
date: 2018-05-03
author: jacob
tags: [js]
---
Hello!

```js
const x = {a: 1};
```
";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_build_site() -> anyhow::Result<()> {
    let project = TempDir::new()?;
    let root = project.path();
    write(
        &root.join(PROJECT_FILE),
        "title: Krawaller weblog
description: Kittens and code
author: The Krawaller brothers
site_url: https://blog.krawaller.se
static_dir: __STATIC__
markdown:
  highlight: false
",
    );
    write(&root.join("sources/hooks/post.md"), HOOKS);
    write(&root.join("sources/hooks/__STATIC__/hooks.css"), "h1 {}");
    write(&root.join("sources/hooks/__STATIC__/img/cat.png"), "meow");
    write(&root.join("sources/intro/post.md"), INTRO);
    write(&root.join("pages/posts/stale/index.js"), "stale");
    write(&root.join("pages/about.js"), "keep me");

    build_site(&Config::from_directory(root)?)?;

    assert!(!root.join("pages/posts/stale").exists());
    assert_eq!("keep me", fs::read_to_string(root.join("pages/about.js"))?);

    let index = fs::read_to_string(root.join("pages/index.js"))?;
    assert!(index.contains(r#"<Master title="Krawaller weblog" summary="Kittens and code">"#));
    assert!(index.contains(r#"<Link href="/posts/react-hooks" prefetch><a>2019-02-01: Hooks &amp; friends</a></Link>"#));

    let hooks = fs::read_to_string(root.join("pages/posts/react-hooks/index.js"))?;
    assert!(hooks.contains("../static/posts/react-hooks/img/cat.png"));
    assert!(hooks.contains(r#"href="../static/posts/react-hooks/hooks.css""#));
    assert!(hooks.contains(r#"<Link href="/posts/intro" prefetch><a>the intro</a></Link>"#));
    assert!(hooks.contains(r#"className="note""#));
    assert!(hooks.contains(r#"style={{"marginTop":"1em"}}"#));
    assert!(hooks.contains("<br/>"));

    let intro = fs::read_to_string(root.join("pages/posts/intro/index.js"))?;
    assert!(intro.contains(r#"const x = {"{"}a: 1{"}"};"#));

    let js = fs::read_to_string(root.join("pages/tags/js.js"))?;
    assert!(js.contains("There are 2 posts tagged with js:"));
    assert!(js.contains("const TagJs = () => ("));
    let react = fs::read_to_string(root.join("pages/tags/react.js"))?;
    assert!(react.contains("There is 1 post tagged with react:"));

    assert_eq!(
        "meow",
        fs::read_to_string(root.join("static/posts/react-hooks/img/cat.png"))?
    );
    assert!(!root.join("static/posts/intro").exists());

    let feed = fs::read(root.join(FEED_FILE))?;
    let channel = rss::Channel::read_from(&feed[..])?;
    assert_eq!("Krawaller weblog", channel.title());
    assert_eq!(2, channel.items().len());
    assert_eq!(
        Some("https://blog.krawaller.se/posts/react-hooks"),
        channel.items()[0].link()
    );
    Ok(())
}

#[test]
fn test_build_site_duplicate_url() -> anyhow::Result<()> {
    let project = TempDir::new()?;
    let root = project.path();
    write(&root.join("sources/a/post.md"), INTRO);
    write(&root.join("sources/b/post.md"), &INTRO.replace("id: intro", "id: other"));

    let err = build_site(&Config::from_directory(root)?).unwrap_err();
    assert!(err.to_string().contains("intro"), "{}", err);
    assert!(!root.join(FEED_FILE).exists());
    Ok(())
}
