use radix_mux::{
    middleware, middleware_fn, status, url_param, Handler, Method, Middleware, Mux, Request,
    Response, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::convert::Infallible;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize)]
struct Account {
    id: i64,
    name: String,
}

fn accounts() -> BTreeMap<i64, Account> {
    [(1, "alice"), (2, "bob"), (3, "carol")]
        .into_iter()
        .map(|(id, name)| {
            (
                id,
                Account {
                    id,
                    name: name.to_string(),
                },
            )
        })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(resp: &mut Response, value: &T) {
    if let Err(err) = resp.write_json(value) {
        warn!(error = %err, "failed to encode response body");
        resp.status = status::INTERNAL_SERVER_ERROR;
    }
}

fn write_error(resp: &mut Response, code: u16, message: String) {
    resp.status = code;
    write_json(resp, &json!({ "code": code, "message": message }));
}

/// Parses the `{id}` URL parameter and stores it in the request context.
fn extract_id() -> Middleware {
    middleware_fn(|next| {
        Handler::from_fn(move |req, resp| {
            let id = url_param(req, "id").and_then(|raw| raw.parse::<i64>().ok());
            match id {
                Some(id) if id != 0 => {
                    req.context.set_value("id", id);
                    next.serve(req, resp);
                }
                _ => {
                    let message = format!("{}: id not found or is 0", req.path);
                    write_error(resp, status::BAD_REQUEST, message);
                }
            }
        })
    })
}

/// Rejects requests without the admin token header.
fn require_admin() -> Middleware {
    middleware_fn(|next| {
        Handler::from_fn(move |req, resp| {
            if req.header("X-Admin-Token") == Some("secret") {
                next.serve(req, resp);
            } else {
                write_error(resp, 403, "admin token required".to_string());
            }
        })
    })
}

fn build_gateway() -> radix_mux::Result<Mux> {
    let mut mux = Mux::new();
    mux.use_middleware(middleware::logger())?;
    mux.use_middleware(middleware::strip_trailing_slash())?;

    mux.set_not_found(Handler::from_fn(|req, resp| {
        let message = format!("no route for {}", req.path);
        write_error(resp, status::NOT_FOUND, message);
    }))?;
    mux.set_method_not_allowed(Handler::from_fn(|req, resp| {
        let message = format!("{} is not supported here", req.method);
        write_error(resp, status::METHOD_NOT_ALLOWED, message);
    }))?;

    mux.get("/", |_, resp| resp.write("gateway"))?;
    mux.get("/health", |_, resp| {
        write_json(resp, &json!({ "status": "ok" }));
    })?;

    mux.route("/accounts", |r| {
        r.get("/", |_, resp| {
            let list: Vec<Account> = accounts().into_values().collect();
            write_json(resp, &list);
        })?;
        r.with(vec![extract_id()]).get("/{id}", |req, resp| {
            let id = req.context.try_get_value::<i64>("id").copied().unwrap_or_default();
            match accounts().get(&id) {
                Some(account) => write_json(resp, account),
                None => write_error(resp, status::NOT_FOUND, format!("account {id} does not exist")),
            }
        })?;
        Ok(())
    })?;

    mux.group(|admin| {
        admin.use_middleware(require_admin())?;
        admin.post("/admin/reindex", |_, resp| resp.write("reindexing"))?;
        admin.delete("/admin/cache/{key:[a-z0-9_]+}", |req, resp| {
            let key = url_param(req, "key").unwrap_or_default().to_string();
            resp.write(&format!("evicted {key}"));
        })?;
        Ok(())
    })?;

    let mut assets = Mux::new();
    assets.get("/*", |req, resp| {
        let file = url_param(req, "*").unwrap_or_default().to_string();
        resp.set_header("Content-Type", "application/octet-stream");
        resp.write(&file);
    })?;
    mux.mount("/assets", assets)?;

    Ok(mux)
}

fn call(mux: &Mux, req: Request) -> Response {
    let mut req = req;
    let mut resp = Response::new();
    mux.serve(&mut req, &mut resp);
    resp
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Real-World API Gateway Integration Test ===\n");
    let mux = build_gateway()?;

    let mut passed = 0;
    let mut check = |desc: &str, resp: &Response, code: u16, body: &str| {
        assert_eq!(resp.status, code, "{desc}: {}", resp.body);
        assert!(resp.body.contains(body), "{desc}: {}", resp.body);
        println!("  ✓ {desc} -> {} {}", resp.status, resp.body);
        passed += 1;
    };

    println!("Public routes:");
    check("root", &call(&mux, Request::new(Method::GET, "/")), 200, "gateway");
    check("health", &call(&mux, Request::new(Method::GET, "/health/")), 200, "ok");
    println!();

    println!("Mounted accounts router:");
    check("list", &call(&mux, Request::new(Method::GET, "/accounts")), 200, "carol");
    check("list with slash", &call(&mux, Request::new(Method::GET, "/accounts/")), 200, "alice");
    check("by id", &call(&mux, Request::new(Method::GET, "/accounts/2")), 200, "bob");
    check("unknown id", &call(&mux, Request::new(Method::GET, "/accounts/9")), 404, "does not exist");
    check("bad id", &call(&mux, Request::new(Method::GET, "/accounts/abc")), 400, "id not found");
    check("zero id", &call(&mux, Request::new(Method::GET, "/accounts/0")), 400, "is 0");
    check("wrong method", &call(&mux, Request::new(Method::POST, "/accounts/2")), 405, "POST");
    println!();

    println!("Admin group:");
    check("no token", &call(&mux, Request::new(Method::POST, "/admin/reindex")), 403, "token");
    let req = Request::new(Method::POST, "/admin/reindex").with_header("X-Admin-Token", "secret");
    check("with token", &call(&mux, req), 200, "reindexing");
    let req = Request::new(Method::DELETE, "/admin/cache/user_1").with_header("X-Admin-Token", "secret");
    check("cache eviction", &call(&mux, req), 200, "evicted user_1");
    let req = Request::new(Method::DELETE, "/admin/cache/BAD").with_header("X-Admin-Token", "secret");
    check("bad cache key", &call(&mux, req), 404, "no route");
    println!();

    println!("Assets:");
    check("asset", &call(&mux, Request::new(Method::GET, "/assets/css/site.css")), 200, "css/site.css");
    check("unknown", &call(&mux, Request::new(Method::GET, "/nope")), 404, "no route for /nope");
    println!();

    println!("=== Route Walk ===");
    mux.walk(|method, pattern, _, middlewares| {
        println!("  {method:7} {pattern:32} middlewares={}", middlewares.len());
        Ok::<(), Infallible>(())
    })?;
    println!();

    println!("=== Integration Test Summary ===");
    println!("  {passed} requests checked");
    Ok(())
}
