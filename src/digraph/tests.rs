use super::Digraph;

#[test]
fn test_independent_vertices_keep_order() {
    let mut graph = Digraph::new();
    for vertex in ["c", "a", "b"] {
        graph.add_vertex(vertex);
    }
    assert_eq!(graph.sort(), Ok(vec!["c", "a", "b"]));
}

#[test]
fn test_dependencies_come_first() {
    let mut graph = Digraph::new();
    graph.add_vertex("render");
    graph.add_vertex("physics");
    graph.add_vertex("input");
    graph.add_dependency("render", "physics");
    graph.add_dependency("physics", "input");

    assert_eq!(graph.sort(), Ok(vec!["input", "physics", "render"]));
}

#[test]
fn test_diamond() {
    let mut graph = Digraph::new();
    graph.add_dependency("d", "b");
    graph.add_dependency("d", "c");
    graph.add_dependency("b", "a");
    graph.add_dependency("c", "a");

    let order = graph.sort().expect("acyclic");
    assert_eq!(order, ["a", "b", "c", "d"]);
    assert_eq!(graph.dependents_of(&"a").copied().collect::<Vec<_>>(), ["b", "c"]);
}

#[test]
fn test_duplicate_edges_are_merged() {
    let mut graph = Digraph::new();
    graph.add_dependency(2, 1);
    graph.add_dependency(2, 1);
    assert_eq!(graph.len(), 2);
    assert_eq!(graph.dependents_of(&1).count(), 1);
    assert_eq!(graph.sort(), Ok(vec![1, 2]));
}

#[test]
fn test_cycle_is_reported() {
    let mut graph = Digraph::new();
    graph.add_vertex("x");
    graph.add_dependency("a", "b");
    graph.add_dependency("b", "a");

    let err = graph.sort().expect_err("cyclic");
    assert_eq!(err.path, ["a", "b", "a"]);
    assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
}

#[test]
fn test_cycle_path_starts_at_repeated_vertex() {
    let mut graph = Digraph::new();
    graph.add_dependency("root", "a");
    graph.add_dependency("a", "b");
    graph.add_dependency("b", "c");
    graph.add_dependency("c", "a");

    let err = graph.sort().expect_err("cyclic");
    assert_eq!(err.path, ["a", "b", "c", "a"]);
}

#[test]
fn test_self_loop() {
    let mut graph = Digraph::new();
    graph.add_dependency("a", "a");
    assert_eq!(graph.sort().map_err(|err| err.path), Err(vec!["a".to_string(), "a".to_string()]));
}
