use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::{
    interpreter::{callable::Builtin, callable::Callable, ExecutionError, Interpreter, Value},
    span::Position,
};

use super::{ensure_args, write_stdout, BuiltinDoc};

/// A handler registered with `http_register`.
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: String,
    pub handler: Rc<Callable>,
}

impl Route {
    /// Patterns ending in `/` match every path below them.
    fn matches(&self, path: &str) -> bool {
        if self.pattern.ends_with('/') {
            path.starts_with(self.pattern.as_str())
        } else {
            path == self.pattern
        }
    }
}

/// Picks the most specific route for `path`.
pub fn find_route<'a>(routes: &'a [Route], path: &str) -> Option<&'a Route> {
    routes
        .iter()
        .filter(|route| route.matches(path))
        .max_by_key(|route| route.pattern.len())
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET error: {0}")]
    Request(String),
    #[error("Status error: {0}")]
    Status(u16),
    #[error("Read body: {0}")]
    Body(#[from] std::io::Error),
}

pub fn fetch(agent: &ureq::Agent, url: &str) -> Result<String, FetchError> {
    debug!("GET {}", url);
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status(code)),
        Err(err) => return Err(FetchError::Request(err.to_string())),
    };
    if response.status() != 200 {
        return Err(FetchError::Status(response.status()));
    }
    Ok(response.into_string()?)
}

fn file_get_contents(
    interpreter: &mut Interpreter,
    position: Position,
    args: Vec<Value>,
) -> Result<Value, ExecutionError> {
    ensure_args(position, "file_get_contents", &args, 1)?;
    let Value::Str(location) = &args[0] else {
        return Err(ExecutionError::type_error(
            position,
            "file_get_contents() requires a str",
        ));
    };
    let contents = if location.starts_with("http://") || location.starts_with("https://") {
        fetch(&interpreter.agent, location).map_err(|err| err.to_string())
    } else {
        std::fs::read_to_string(location).map_err(|err| err.to_string())
    };
    contents.map(Value::Str).map_err(|message| {
        ExecutionError::runtime_error(position, format!("file_get_contents() error: {}", message))
    })
}

fn http_register(
    interpreter: &mut Interpreter,
    position: Position,
    args: Vec<Value>,
) -> Result<Value, ExecutionError> {
    ensure_args(position, "http_register", &args, 2)?;
    let (Value::Str(pattern), Value::Function(handler)) = (&args[0], &args[1]) else {
        return Err(ExecutionError::type_error(
            position,
            "http_register() requires a str pattern and a function",
        ));
    };
    if !pattern.starts_with('/') {
        return Err(ExecutionError::value_error(
            position,
            format!("http_register() pattern {:?} must start with /", pattern),
        ));
    }

    let route = Route {
        pattern: pattern.clone(),
        handler: handler.clone(),
    };
    match interpreter.routes.iter_mut().find(|r| r.pattern == route.pattern) {
        Some(existing) => {
            warn!("replacing handler for {}", route.pattern);
            *existing = route;
        }
        None => {
            info!("registered handler for {}", route.pattern);
            interpreter.routes.push(route);
        }
    }
    Ok(Value::Nil)
}

/// Status and body for a request to `path`. Only `exit()` inside a handler
/// escapes; every other handler error becomes a 500 response.
pub fn handle(
    interpreter: &mut Interpreter,
    position: Position,
    path: &str,
) -> Result<(u16, String), ExecutionError> {
    let handler = find_route(&interpreter.routes, path).map(|route| route.handler.clone());
    match handler {
        None => Ok((404, "404 page not found\n".to_string())),
        Some(handler) => match handler.call(interpreter, position, Vec::new()) {
            Ok(value) => Ok((200, format!("{}\n", value))),
            Err(exit @ ExecutionError::Exit(_)) => Err(exit),
            Err(err) => {
                error!("{}: {}", path, err);
                Ok((500, "500 internal server error\n".to_string()))
            }
        },
    }
}

/// Serves one request on the calling thread.
fn respond(
    interpreter: &mut Interpreter,
    position: Position,
    request: tiny_http::Request,
) -> Result<(), ExecutionError> {
    let path = request.url().split('?').next().unwrap_or_default().to_string();
    let (status, body) = handle(interpreter, position, &path)?;

    info!("{} {} {}", request.method(), path, status);
    let response = tiny_http::Response::from_string(body).with_status_code(status);
    if let Err(err) = request.respond(response) {
        warn!("failed to respond to {}: {}", path, err);
    }
    Ok(())
}

fn http_listen(
    interpreter: &mut Interpreter,
    position: Position,
    args: Vec<Value>,
) -> Result<Value, ExecutionError> {
    ensure_args(position, "http_listen", &args, 1)?;
    let Value::Str(address) = &args[0] else {
        return Err(ExecutionError::type_error(
            position,
            "http_listen() requires first argument to be a str",
        ));
    };
    let (bind, display) = if address.starts_with(':') {
        (format!("0.0.0.0{}", address), format!("http://localhost{}", address))
    } else {
        (address.clone(), format!("http://{}", address))
    };

    let server = tiny_http::Server::http(bind.as_str()).map_err(|err| {
        ExecutionError::runtime_error(position, format!("http_listen() error: {}", err))
    })?;
    write_stdout(
        interpreter,
        position,
        &format!("Server is starting on {}...\n", display),
    )?;
    info!("listening on {} with {} routes", bind, interpreter.routes.len());

    for request in server.incoming_requests() {
        respond(interpreter, position, request)?;
    }
    Ok(Value::Nil)
}

pub(super) static FUNCTIONS: &[Builtin] = &[
    Builtin {
        name: "file_get_contents",
        function: file_get_contents,
        doc: BuiltinDoc {
            title: "File Get Contents",
            category: "File System",
            args: "path or url",
            returns: "str",
            example: "echo(file_get_contents(\"https://example.com\"))",
            output: "<!doctype html>...",
            description: "Get the contents of a local file, or of a URL with an HTTP GET.",
        },
    },
    Builtin {
        name: "http_register",
        function: http_register,
        doc: BuiltinDoc {
            title: "HTTP Register",
            category: "HTTP",
            args: "pattern, handler",
            returns: "nil",
            example: "http_register(\"/\", function() { return \"Hello, World!\" })",
            output: "Hello, World!",
            description: "Register a handler function for a URL pattern. Patterns ending in / match every path below them.",
        },
    },
    Builtin {
        name: "http_listen",
        function: http_listen,
        doc: BuiltinDoc {
            title: "HTTP Listen",
            category: "HTTP",
            args: "address",
            returns: "nil",
            example: "http_listen(\":8080\")",
            output: "Server is starting on http://localhost:8080...",
            description: "Serve the registered handlers on an address, one request at a time.",
        },
    },
];

#[cfg(test)]
mod test {
    use std::{cell::RefCell, io::Write};

    use super::*;
    use crate::interpreter::{builtins::Builtins, Config};

    fn route(pattern: &str) -> Route {
        let builtins = Builtins::standard();
        Route {
            pattern: pattern.to_string(),
            handler: builtins.get("time").unwrap().clone(),
        }
    }

    #[test]
    fn test_find_route_prefers_longest_match() {
        let routes = vec![route("/"), route("/api/"), route("/api/users"), route("/about")];
        let found = |path: &str| find_route(&routes, path).map(|r| r.pattern.as_str());

        assert_eq!(found("/"), Some("/"));
        assert_eq!(found("/missing"), Some("/"));
        assert_eq!(found("/api/users"), Some("/api/users"));
        assert_eq!(found("/api/users/1"), Some("/api/"));
        assert_eq!(found("/about"), Some("/about"));
        assert_eq!(found("/about/team"), Some("/"));
    }

    #[test]
    fn test_no_catch_all() {
        let routes = vec![route("/exact")];
        assert!(find_route(&routes, "/exact/more").is_none());
        assert!(find_route(&routes, "/").is_none());
    }

    #[test]
    fn test_register() {
        let mut interpreter = Interpreter::default();
        let handler = Value::Function(route("/").handler);
        let at = Position::new(1, 1);

        http_register(&mut interpreter, at, vec![Value::str("/a"), handler.clone()]).unwrap();
        http_register(&mut interpreter, at, vec![Value::str("/a"), handler.clone()]).unwrap();
        http_register(&mut interpreter, at, vec![Value::str("/b/"), handler.clone()]).unwrap();
        assert_eq!(interpreter.routes.len(), 2);

        let err = http_register(&mut interpreter, at, vec![Value::str("/c"), Value::Int(1)]).unwrap_err();
        assert!(matches!(err, ExecutionError::Type { .. }));
        let err = http_register(&mut interpreter, at, vec![Value::str("c"), handler]).unwrap_err();
        assert!(matches!(err, ExecutionError::Value { .. }));
    }

    #[test]
    fn test_handle_requests() {
        let source = r#"
        $hits = 0
        http_register("/", function() {
            $hits = $hits + 1
            return $hits
        })
        http_register("/api/", function() { return {"ok": true} })
        http_register("/broken", function() { return 1 / 0 })
        http_register("/quit", function() { exit(2) })
        "#;
        let program = crate::parser::parse_program(source.as_bytes()).unwrap();
        let mut interpreter = Interpreter::default();
        interpreter.interpret(&program).unwrap();
        let at = Position::new(1, 1);

        assert_eq!(handle(&mut interpreter, at, "/").unwrap(), (200, "1\n".to_string()));
        assert_eq!(handle(&mut interpreter, at, "/").unwrap(), (200, "2\n".to_string()));
        assert_eq!(
            handle(&mut interpreter, at, "/api/status").unwrap(),
            (200, "{\"ok\": true}\n".to_string())
        );
        assert_eq!(
            handle(&mut interpreter, at, "/broken").unwrap(),
            (500, "500 internal server error\n".to_string())
        );
        assert!(matches!(
            handle(&mut interpreter, at, "/quit"),
            Err(ExecutionError::Exit(2))
        ));

        interpreter.routes.retain(|route| route.pattern != "/");
        assert_eq!(
            handle(&mut interpreter, at, "/missing").unwrap(),
            (404, "404 page not found\n".to_string())
        );
    }

    #[test]
    fn test_file_get_contents_reads_local_files() {
        let path = std::env::temp_dir().join(format!("davi-fgc-{}.txt", std::process::id()));
        std::fs::File::create(&path)
            .and_then(|mut file| file.write_all(b"local contents"))
            .unwrap();

        let stdout = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut interpreter = Interpreter::new(Config::default().with_stdout(stdout));
        let result = file_get_contents(
            &mut interpreter,
            Position::new(1, 1),
            vec![Value::str(path.to_string_lossy())],
        );
        std::fs::remove_file(&path).unwrap();
        assert_eq!(result.unwrap().to_string(), "local contents");

        let err = file_get_contents(
            &mut interpreter,
            Position::new(1, 1),
            vec![Value::str("/no/such/file")],
        )
        .unwrap_err();
        assert!(matches!(err, ExecutionError::Runtime { .. }));
    }
}
