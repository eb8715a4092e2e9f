fn main() {
    if let Err(err) = react_workflow_diagram::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
