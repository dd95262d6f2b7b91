use radix_mux::{middleware, url_param, Method, Mux, Request, Response, Router};
use tracing_subscriber::EnvFilter;

fn call(mux: &Mux, method: Method, uri: &str) -> Response {
    let mut req = Request::new(method, uri);
    let mut resp = Response::new();
    mux.serve(&mut req, &mut resp);
    resp
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut mux = Mux::new();
    mux.use_middleware(middleware::logger())?;

    mux.get("/api/users", |_, resp| resp.write("user list"))?;
    mux.get("/api/users/{id}", |req, resp| {
        let id = url_param(req, "id").unwrap_or_default().to_string();
        resp.write(&format!("user {id}"));
    })?;
    mux.put("/api/users/{id}", |req, resp| {
        let id = url_param(req, "id").unwrap_or_default().to_string();
        resp.write(&format!("updated {id}"));
    })?;
    mux.get("/api/users/{uid}/posts/{pid:[0-9]+}", |req, resp| {
        let uid = url_param(req, "uid").unwrap_or_default().to_string();
        let pid = url_param(req, "pid").unwrap_or_default().to_string();
        resp.write(&format!("post {pid} of {uid}"));
    })?;
    mux.get("/files/*", |req, resp| {
        let path = url_param(req, "*").unwrap_or_default().to_string();
        resp.write(&format!("file {path}"));
    })?;

    println!("=== Radix Mux Examples ===\n");

    // Example 1: Static path
    {
        println!("1. Static path:");
        println!("   GET /api/users");
        let resp = call(&mux, Method::GET, "/api/users");
        assert_eq!(resp.body, "user list");
        println!("   ✓ {} {}", resp.status, resp.body);
        println!();
    }

    // Example 2: Parameter extraction
    {
        println!("2. Parameter extraction:");
        println!("   GET /api/users/12345");
        let resp = call(&mux, Method::GET, "/api/users/12345");
        assert_eq!(resp.body, "user 12345");
        println!("   ✓ {} {}", resp.status, resp.body);
        println!();
    }

    // Example 3: Regex constrained parameter
    {
        println!("3. Regex constrained parameter:");
        println!("   GET /api/users/alice/posts/7");
        let resp = call(&mux, Method::GET, "/api/users/alice/posts/7");
        assert_eq!(resp.body, "post 7 of alice");
        println!("   ✓ {} {}", resp.status, resp.body);

        println!("   GET /api/users/alice/posts/latest");
        let resp = call(&mux, Method::GET, "/api/users/alice/posts/latest");
        assert_eq!(resp.status, 404);
        println!("   ✓ {} {}", resp.status, resp.body);
        println!();
    }

    // Example 4: Wildcard
    {
        println!("4. Wildcard path:");
        println!("   GET /files/docs/2024/report.pdf");
        let resp = call(&mux, Method::GET, "/files/docs/2024/report.pdf");
        assert_eq!(resp.body, "file docs/2024/report.pdf");
        println!("   ✓ {} {}", resp.status, resp.body);
        println!();
    }

    // Example 5: Method not allowed
    {
        println!("5. Method not allowed:");
        println!("   DELETE /api/users/1");
        let resp = call(&mux, Method::DELETE, "/api/users/1");
        assert_eq!(resp.status, 405);
        println!("   ✓ {} {}", resp.status, resp.body);
        println!();
    }

    // Example 6: Route table
    {
        println!("6. Route table:");
        println!("{}", serde_json::to_string_pretty(&mux.route_table())?);
        println!();
    }

    Ok(())
}
