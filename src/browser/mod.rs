//! 浏览器获取：连接已打开的调试端口，或启动新的浏览器进程

mod connection;
mod launch;

pub use connection::connect_to_browser_and_page;
pub use launch::launch_browser;
