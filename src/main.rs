mod board;
mod book;
mod evaluate;
mod history;
mod lookup;
mod movepick;
mod parameters;
mod pv;
mod root;
mod search;
mod stack;
mod thread;
mod timeman;
mod transposition;
mod types;
mod uci;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    uci::message_loop();
}
