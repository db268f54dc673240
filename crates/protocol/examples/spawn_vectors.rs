//! Print spawn payloads as byte arrays for backend interop testing.
//!
//! Run with: cargo run --package protocol --example spawn_vectors

use protocol::SpawnRequest;

fn main() {
    let none: [&str; 0] = [];

    // Vector 1: default shell, no environment
    let req = SpawnRequest::new("sh", &none, "/", std::iter::empty()).unwrap();
    print_vector("spawn_default", &req);

    // Vector 2: argument with spaces
    let req = SpawnRequest::new("echo", &["hello world"], "/tmp", std::iter::empty()).unwrap();
    print_vector("spawn_spaces", &req);

    // Vector 3: empty argument and embedded single quote
    let req = SpawnRequest::new("printf", &["", "it's"], "/tmp", std::iter::empty()).unwrap();
    print_vector("spawn_quotes", &req);

    // Vector 4: environment pairs
    let req = SpawnRequest::new(
        "env",
        &none,
        "/",
        [("TERM", "xterm-256color"), ("TEST_VAR", "a=b")],
    )
    .unwrap();
    print_vector("spawn_env", &req);
}

fn print_vector(name: &str, req: &SpawnRequest) {
    println!("// {}", name);
    print_bytes(&format!("{name}_cmdline"), req.command_line().to_bytes_with_nul());
    print_bytes(&format!("{name}_cwd"), req.cwd().to_bytes_with_nul());
    print_bytes(&format!("{name}_env"), req.env_block());
}

fn print_bytes(name: &str, bytes: &[u8]) {
    print!("const {} = [", name);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            print!(", ");
        }
        print!("{}", b);
    }
    println!("];");
}
