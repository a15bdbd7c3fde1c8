//! Stream (TCP/UDP) configuration: upstream groups plus their servers.

use crate::conf::block::ConfBlock;
use crate::conf::server::ServerConf;

#[derive(Debug, Clone, Default)]
pub struct StreamConf {
    block: ConfBlock,
}

impl StreamConf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `upstream <name>` with one `server` line per `host:port` target.
    pub fn upstream<S: AsRef<str>>(&mut self, name: &str, targets: &[S]) -> &mut Self {
        let mut group = ConfBlock::new();
        for target in targets {
            group.add_directive("server", target.as_ref());
        }
        self.block
            .add_block(format!("upstream {name}"), group.render());
        self
    }

    pub fn server(&mut self, server: &ServerConf) -> &mut Self {
        self.block.add_block("server", server.body());
        self
    }

    pub fn render(&self) -> String {
        self.block.render()
    }
}
