/// Edge cases and boundary conditions testing
/// This example exercises pattern corner cases, registration errors and
/// fallback behavior to check router robustness
use radix_mux::{url_param, Handler, Method, Mux, Request, Response, Router, RouterError, RoutingContext};

fn call(mux: &Mux, method: Method, uri: &str) -> Response {
    let mut req = Request::new(method, uri);
    let mut resp = Response::new();
    mux.serve(&mut req, &mut resp);
    resp
}

fn echo(key: &'static str) -> Handler {
    Handler::from_fn(move |req, resp| {
        let value = url_param(req, key).unwrap_or_default().to_string();
        resp.write(&value);
    })
}

fn main() -> anyhow::Result<()> {
    println!("=== Edge Cases & Boundary Conditions Test ===\n");

    // Test 1: Root and near-root paths
    println!("Test 1: Root and near-root paths");
    {
        let mut mux = Mux::new();
        mux.get("/", |_, resp| resp.write("root"))?;
        mux.get("/api", |_, resp| resp.write("api"))?;

        assert_eq!(call(&mux, Method::GET, "/").body, "root");
        println!("  ✓ Root path '/' matched");
        assert_eq!(call(&mux, Method::GET, "/api").body, "api");
        println!("  ✓ Path '/api' matched");
        assert_eq!(call(&mux, Method::GET, "").body, "root");
        println!("  ✓ Empty path is routed as '/'");
        assert_eq!(call(&mux, Method::GET, "/api/").status, 404);
        println!("  ✓ Trailing slash is a different route");
    }
    println!();

    // Test 2: Shared prefixes split correctly
    println!("Test 2: Shared prefixes");
    {
        let mut mux = Mux::new();
        for path in ["/search", "/support", "/su", "/s", "/sup"] {
            mux.get(path, move |_, resp| resp.write(path))?;
        }
        for path in ["/search", "/support", "/su", "/s", "/sup"] {
            assert_eq!(call(&mux, Method::GET, path).body, path);
        }
        println!("  ✓ Five overlapping static routes resolve independently");
        assert_eq!(call(&mux, Method::GET, "/supp").status, 404);
        println!("  ✓ Partial prefix '/supp' is not found");
    }
    println!();

    // Test 3: Static beats parameter, parameter beats wildcard
    println!("Test 3: Matching priority");
    {
        let mut mux = Mux::new();
        mux.get("/users/me", |_, resp| resp.write("static"))?;
        mux.handle_method(Method::GET, "/users/{id}", echo("id"))?;
        mux.handle_method(Method::GET, "/users/*", echo("*"))?;

        assert_eq!(call(&mux, Method::GET, "/users/me").body, "static");
        println!("  ✓ '/users/me' hits the static route");
        assert_eq!(call(&mux, Method::GET, "/users/42").body, "42");
        println!("  ✓ '/users/42' hits the parameter route");
        assert_eq!(call(&mux, Method::GET, "/users/42/avatar").body, "42/avatar");
        println!("  ✓ '/users/42/avatar' falls back to the wildcard");
    }
    println!();

    // Test 4: Custom delimiters and mid-segment parameters
    println!("Test 4: Delimiters");
    {
        let mut mux = Mux::new();
        mux.get("/archive/{year}-{month}", |req, resp| {
            let year = url_param(req, "year").unwrap_or_default().to_string();
            let month = url_param(req, "month").unwrap_or_default().to_string();
            resp.write(&format!("{year}/{month}"));
        })?;
        mux.handle_method(Method::GET, "/v{version}/status", echo("version"))?;

        assert_eq!(call(&mux, Method::GET, "/archive/2024-05").body, "2024/05");
        println!("  ✓ '{{year}}-{{month}}' split on '-'");
        assert_eq!(call(&mux, Method::GET, "/v3/status").body, "3");
        println!("  ✓ Parameter in the middle of a segment");
    }
    println!();

    // Test 5: Regex parameters
    println!("Test 5: Regex parameters");
    {
        let mut mux = Mux::new();
        mux.handle_method(Method::GET, "/code/{code:[A-Z]{3}}", echo("code"))?;
        mux.handle_method(Method::GET, "/code/{num:[0-9]+}", echo("num"))?;

        assert_eq!(call(&mux, Method::GET, "/code/ABC").body, "ABC");
        println!("  ✓ Nested braces inside the regex");
        assert_eq!(call(&mux, Method::GET, "/code/123").body, "123");
        println!("  ✓ Sibling regex nodes tried in order");
        assert_eq!(call(&mux, Method::GET, "/code/ABCD").status, 404);
        println!("  ✓ Regex is anchored");
    }
    println!();

    // Test 6: Non-ASCII paths
    println!("Test 6: Non-ASCII paths");
    {
        let mut mux = Mux::new();
        mux.get("/café", |_, resp| resp.write("café"))?;
        mux.get("/caffè", |_, resp| resp.write("caffè"))?;
        mux.handle_method(Method::GET, "/tags/{tag}", echo("tag"))?;

        assert_eq!(call(&mux, Method::GET, "/café").body, "café");
        assert_eq!(call(&mux, Method::GET, "/caffè").body, "caffè");
        assert_eq!(call(&mux, Method::GET, "/tags/日本").body, "日本");
        println!("  ✓ Multi-byte characters route and capture intact");
    }
    println!();

    // Test 7: Registration errors
    println!("Test 7: Registration errors");
    {
        let mut mux = Mux::new();
        let cases: Vec<(&str, Result<(), RouterError>)> = vec![
            ("no leading slash", mux.get("users", |_, _| {})),
            ("unclosed param", mux.get("/users/{id", |_, _| {})),
            ("wildcard not last", mux.get("/files/*/raw", |_, _| {})),
            ("duplicate key", mux.get("/{a}/{a}", |_, _| {})),
            ("invalid regex", mux.get("/{n:(}", |_, _| {})),
            ("unknown method", mux.method_func("BREW", "/pot", |_, _| {})),
        ];
        for (desc, result) in cases {
            let err = result.expect_err(desc);
            println!("  ✓ {desc}: {err}");
        }

        mux.get("/ok", |_, _| {})?;
        assert!(matches!(
            mux.use_middleware(radix_mux::middleware::logger()),
            Err(RouterError::MiddlewareAfterRoutes)
        ));
        println!("  ✓ Middleware after routes rejected");

        mux.mount("/sub", Mux::new())?;
        assert!(matches!(
            mux.mount("/sub", Mux::new()),
            Err(RouterError::MountCollision(_))
        ));
        println!("  ✓ Second mount on '/sub' rejected");
    }
    println!();

    // Test 8: Method handling
    println!("Test 8: Method handling");
    {
        let mut mux = Mux::new();
        mux.handle_func("/any", |req, resp| resp.write(req.method.as_str()))?;
        mux.delete("/any", |_, resp| resp.write("special delete"))?;

        for method in [Method::GET, Method::POST, Method::PATCH] {
            assert_eq!(call(&mux, method, "/any").body, method.as_str());
        }
        println!("  ✓ Match-all route serves every method");
        assert_eq!(call(&mux, Method::DELETE, "/any").body, "special delete");
        println!("  ✓ Method-specific route overrides match-all");
        assert_eq!(call(&mux, Method::parse("BREW"), "/any").status, 405);
        println!("  ✓ Unknown request method is 405");
    }
    println!();

    // Test 9: Introspection without dispatch
    println!("Test 9: match_route");
    {
        let mut mux = Mux::new();
        mux.route("/api", |api| api.get("/items/{id}", |_, _| {}))?;

        let mut rctx = RoutingContext::new();
        assert!(mux.match_route(&mut rctx, Method::GET, "/api/items/5"));
        assert_eq!(rctx.url_param("id"), Some("5"));
        println!("  ✓ Matched through the mount with id=5");

        let mut rctx = RoutingContext::new();
        assert!(!mux.match_route(&mut rctx, Method::GET, "/api/nothing"));
        println!("  ✓ Unknown sub-path reports no match");
    }
    println!();

    println!("=== All edge case tests passed ===");
    Ok(())
}
