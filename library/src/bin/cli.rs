use blockgraph::GraphError;
use blockgraph::run;

fn main() -> Result<(), GraphError> {
    env_logger::init();
    run(std::env::args().collect())
}
