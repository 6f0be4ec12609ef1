//! Tests for QueryService and tree assembly
//!
//! `build_tree` is tested on hand-made node lists; the service methods run
//! against a real libsql database populated through `MenuService`.

#[cfg(test)]
mod tests {
    use crate::db::{DatabaseService, MenuStore, TursoStore};
    use crate::models::{MenuNode, MenuNodeUpdate, NewMenuNode};
    use crate::services::error::MenuServiceError;
    use crate::services::menu_service::MenuService;
    use crate::services::query_service::{build_tree, QueryService};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Helper to create both services over one database
    async fn create_test_services() -> (QueryService, MenuService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
        let store: Arc<dyn MenuStore> = Arc::new(TursoStore::new(db));

        (
            QueryService::new(store.clone()),
            MenuService::new(store),
            temp_dir,
        )
    }

    fn node(id: &str, parent: Option<&str>, order: u32) -> MenuNode {
        let mut node = MenuNode::new(id.to_uppercase(), None, parent.map(str::to_string), order);
        node.id = id.to_string();
        node
    }

    #[test]
    fn test_build_tree_nests_and_orders_children() {
        let nodes = vec![
            node("b2", Some("b"), 1),
            node("a", None, 1),
            node("b", None, 0),
            node("b1", Some("b"), 0),
            node("b1x", Some("b1"), 0),
        ];

        let tree = build_tree(&nodes);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].node.id, "b");
        assert_eq!(tree[1].node.id, "a");
        assert_eq!(tree[0].ids(), vec!["b", "b1", "b1x", "b2"]);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_build_tree_is_independent_of_input_order() {
        let nodes = vec![
            node("r", None, 0),
            node("c1", Some("r"), 0),
            node("c2", Some("r"), 1),
            node("s", None, 1),
            node("s1", Some("s"), 0),
        ];
        let mut reversed = nodes.clone();
        reversed.reverse();

        assert_eq!(build_tree(&nodes), build_tree(&nodes));
        assert_eq!(build_tree(&nodes), build_tree(&reversed));
    }

    #[test]
    fn test_build_tree_breaks_order_ties_by_id() {
        let nodes = vec![node("y", None, 0), node("x", None, 0)];

        let tree = build_tree(&nodes);
        let ids: Vec<&str> = tree.iter().map(|t| t.node.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_build_tree_drops_orphans() {
        let nodes = vec![
            node("root", None, 0),
            node("orphan", Some("ghost"), 0),
            node("orphan-child", Some("orphan"), 0),
        ];

        let tree = build_tree(&nodes);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].ids(), vec!["root"]);
    }

    #[test]
    fn test_build_tree_handles_deep_chains() {
        let mut nodes = vec![node("n0", None, 0)];
        for i in 1..2_000 {
            nodes.push(node(&format!("n{}", i), Some(&format!("n{}", i - 1)), 0));
        }

        let tree = build_tree(&nodes);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].ids().len(), 2_000);
    }

    #[tokio::test]
    async fn test_get_one_and_not_found() {
        let (query_service, menu_service, _temp) = create_test_services().await;

        let created = menu_service.create(NewMenuNode::new("Home")).await.unwrap();

        let fetched = query_service.get_one(&created.id).await.unwrap();
        assert_eq!(fetched, created);

        let err = query_service.get_one("missing").await.unwrap_err();
        assert!(matches!(err, MenuServiceError::NotFound { ref id } if id == "missing"));
    }

    #[tokio::test]
    async fn test_list_flat_sorted_by_title() {
        let (query_service, menu_service, _temp) = create_test_services().await;

        for title in ["Pricing", "About", "Blog"] {
            menu_service.create(NewMenuNode::new(title)).await.unwrap();
        }

        let titles: Vec<String> = query_service
            .list_flat()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, vec!["About", "Blog", "Pricing"]);
    }

    #[tokio::test]
    async fn test_list_tree_matches_mutations() {
        let (query_service, menu_service, _temp) = create_test_services().await;

        let docs = menu_service.create(NewMenuNode::new("Docs")).await.unwrap();
        let blog = menu_service.create(NewMenuNode::new("Blog")).await.unwrap();
        let intro = menu_service
            .create(NewMenuNode::new("Intro").with_parent(&docs.id))
            .await
            .unwrap();
        let setup = menu_service
            .create(NewMenuNode::new("Setup").with_parent(&docs.id).at_order(0))
            .await
            .unwrap();

        let tree = query_service.list_tree().await.unwrap();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].node.id, docs.id);
        assert_eq!(tree[1].node.id, blog.id);
        assert_eq!(
            tree[0].ids(),
            vec![docs.id.clone(), setup.id.clone(), intro.id.clone()]
        );

        let again = query_service.list_tree().await.unwrap();
        assert_eq!(tree, again);
    }

    #[tokio::test]
    async fn test_list_children_and_subtree() {
        let (query_service, menu_service, _temp) = create_test_services().await;

        let docs = menu_service.create(NewMenuNode::new("Docs")).await.unwrap();
        let guides = menu_service
            .create(NewMenuNode::new("Guides").with_parent(&docs.id))
            .await
            .unwrap();
        let deploy = menu_service
            .create(NewMenuNode::new("Deploy").with_parent(&guides.id))
            .await
            .unwrap();
        menu_service.create(NewMenuNode::new("Blog")).await.unwrap();

        let children = query_service.list_children(Some(&docs.id)).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, guides.id);

        let roots = query_service.list_children(None).await.unwrap();
        assert_eq!(roots.len(), 2);

        let subtree = query_service.get_subtree(&guides.id).await.unwrap();
        assert_eq!(subtree.node.parent_id.as_deref(), Some(docs.id.as_str()));
        assert_eq!(subtree.ids(), vec![guides.id.clone(), deploy.id.clone()]);

        let err = query_service.get_subtree("missing").await.unwrap_err();
        assert!(matches!(err, MenuServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_removed_nodes_never_appear_in_tree() {
        let (query_service, menu_service, _temp) = create_test_services().await;

        let keep = menu_service.create(NewMenuNode::new("Keep")).await.unwrap();
        let drop_me = menu_service.create(NewMenuNode::new("Drop")).await.unwrap();
        let child = menu_service
            .create(NewMenuNode::new("Child").with_parent(&drop_me.id))
            .await
            .unwrap();
        menu_service
            .create(NewMenuNode::new("Grandchild").with_parent(&child.id))
            .await
            .unwrap();

        menu_service.remove(&drop_me.id).await.unwrap();

        let tree = query_service.list_tree().await.unwrap();
        let ids: Vec<String> = tree.iter().flat_map(|t| t.ids()).collect();
        assert_eq!(ids, vec![keep.id.clone()]);
        assert!(query_service.audit().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audit_reports_update_reparent_gap() {
        let (query_service, menu_service, _temp) = create_test_services().await;

        menu_service.create(NewMenuNode::new("A")).await.unwrap();
        let b = menu_service.create(NewMenuNode::new("B")).await.unwrap();
        let c = menu_service.create(NewMenuNode::new("C")).await.unwrap();
        assert!(query_service.audit().await.unwrap().is_empty());

        // A plain update re-parents without renumbering
        menu_service
            .update(&b.id, MenuNodeUpdate::new().with_parent(&c.id))
            .await
            .unwrap();

        let violations = query_service.audit().await.unwrap();
        assert!(!violations.is_empty());
    }
}
