//! Minimal embedding: send `{self(), hello}` to a server registered on
//! a peer node and print the replies.
//!
//! ```text
//! cargo run --example reply_client -- console@localhost server@localhost secret
//! ```

use std::time::Duration;

use erlink::Node;
use erlink_term::Term;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (local, remote) = match (args.next(), args.next()) {
        (Some(local), Some(remote)) => (local, remote),
        _ => {
            eprintln!("usage: reply_client <local_node> <remote_node> [cookie]");
            std::process::exit(2);
        }
    };
    let cookie = args.next();

    let node = match Node::start(&local, cookie.as_deref()) {
        Ok(node) => node,
        Err(err) => {
            eprintln!("cannot start node: {}", err);
            std::process::exit(1);
        }
    };
    let mailbox = node.create_mailbox();

    let greeting = Term::tuple(vec![
        Term::Pid(mailbox.pid().clone()),
        Term::atom("hello").expect("static atom"),
    ]);

    for _ in 0..5 {
        if let Err(err) = mailbox.send_reg(&remote, "reply_server", greeting.clone()) {
            eprintln!("send failed: {}", err);
            break;
        }
        match mailbox.receive_timeout(Duration::from_secs(5)) {
            Some(reply) => match reply.payload() {
                Some(term) => println!("received response: {}", term),
                None => println!("received control message: {:?}", reply),
            },
            None => println!("no response within 5s"),
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    node.close();
}
