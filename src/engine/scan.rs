use crate::core::{Arg, Path, Seg};
use crate::future::Future;

/// Collects every future in the argument tree together with the position it
/// occupies. A future placed at several positions is reported once per
/// position.
pub(crate) fn scan(args: &[Arg]) -> Vec<(Path, Future<Arg>)> {
    let mut found = Vec::new();
    let mut path = Vec::new();

    for (index, arg) in args.iter().enumerate() {
        path.push(Seg::Index(index));
        visit(arg, &mut path, &mut found);
        path.pop();
    }

    found
}

fn visit(arg: &Arg, path: &mut Path, found: &mut Vec<(Path, Future<Arg>)>) {
    match arg {
        Arg::Future(future) => found.push((path.clone(), future.clone())),
        Arg::Seq(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(Seg::Index(index));
                visit(item, path, found);
                path.pop();
            }
        }
        Arg::Map(map) => {
            for (key, item) in map {
                path.push(Seg::Key(key.clone()));
                visit(item, path, found);
                path.pop();
            }
        }
        Arg::Value(_) | Arg::Opaque(_) => {}
    }
}
