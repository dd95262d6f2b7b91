/// Concurrent dispatch test demonstrating the router's thread-safety
/// Once built, a router is shared behind an `Arc` and served from many threads
/// without locks; every request carries its own routing context
use radix_mux::{url_param, Method, Mux, Request, Response, Router};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn build() -> radix_mux::Result<Mux> {
    let mut mux = Mux::new();
    mux.get("/api/users", |_, resp| resp.write("users"))?;
    mux.get("/api/posts", |_, resp| resp.write("posts"))?;
    mux.get("/api/user/{id}", |req, resp| {
        let id = url_param(req, "id").unwrap_or_default().to_string();
        resp.write(&id);
    })?;
    mux.get("/api/user/{uid}/post/{pid:[0-9]+}", |req, resp| {
        let uid = url_param(req, "uid").unwrap_or_default().to_string();
        let pid = url_param(req, "pid").unwrap_or_default().to_string();
        resp.write(&format!("{uid}:{pid}"));
    })?;
    mux.route("/files", |files| {
        files.get("/*", |req, resp| {
            let path = url_param(req, "*").unwrap_or_default().to_string();
            resp.write(&path);
        })
    })?;
    Ok(mux)
}

fn serve(mux: &Mux, path: &str) -> Response {
    let mut req = Request::new(Method::GET, path);
    let mut resp = Response::new();
    mux.serve(&mut req, &mut resp);
    resp
}

fn main() -> anyhow::Result<()> {
    println!("=== Concurrent Dispatch Test ===\n");

    let mux = Arc::new(build()?);

    println!("Router created with 5 routes");
    println!("- 2 static routes");
    println!("- 2 parameter routes");
    println!("- 1 mounted wildcard router\n");

    let test_cases = vec![
        ("/api/users", "users", "static"),
        ("/api/posts", "posts", "static"),
        ("/api/user/123", "123", "single parameter"),
        ("/api/user/123/post/456", "123:456", "multiple parameters"),
        ("/files/documents/readme.txt", "documents/readme.txt", "mounted wildcard"),
    ];

    println!("=== Single-threaded ===");
    for (path, expected, desc) in &test_cases {
        let start = Instant::now();
        let iterations = 100_000;

        for _ in 0..iterations {
            let resp = serve(&mux, path);
            assert_eq!(resp.body, *expected);
        }

        let elapsed = start.elapsed();
        let ops_per_sec = iterations as f64 / elapsed.as_secs_f64();

        println!(
            "{:30} - {:>12.0} ops/sec ({:>8.2} µs/op)",
            desc,
            ops_per_sec,
            elapsed.as_micros() as f64 / iterations as f64
        );
    }

    println!("\n=== Multi-threaded ===");
    let num_threads = 8;
    println!("Running with {} concurrent threads...\n", num_threads);

    for (path, expected, desc) in &test_cases {
        let start = Instant::now();
        let iterations_per_thread = 50_000;

        let mut handles = vec![];

        for _ in 0..num_threads {
            let mux = Arc::clone(&mux);
            let path = path.to_string();
            let expected = expected.to_string();

            handles.push(thread::spawn(move || {
                for _ in 0..iterations_per_thread {
                    let resp = serve(&mux, &path);
                    assert_eq!(resp.body, expected);
                }
            }));
        }

        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
        }

        let elapsed = start.elapsed();
        let total_ops = num_threads * iterations_per_thread;
        let ops_per_sec = total_ops as f64 / elapsed.as_secs_f64();

        println!(
            "{:30} - {:>12.0} ops/sec ({:>8.2} µs/op)",
            desc,
            ops_per_sec,
            elapsed.as_micros() as f64 / total_ops as f64
        );
    }

    println!("\n=== Mixed paths across threads ===");
    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let mux = Arc::clone(&mux);
            thread::spawn(move || {
                for i in 0..10_000 {
                    let id = format!("{t}-{i}");
                    let resp = serve(&mux, &format!("/api/user/{id}"));
                    assert_eq!(resp.body, id);
                }
            })
        })
        .collect();
    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))?;
    }
    println!("✅ Captures never leak between concurrent requests");

    Ok(())
}
