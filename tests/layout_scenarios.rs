//! Layout scenarios exercised through the public library API: row
//! validation, placement checks, item insertion, and grid migration.

mod common;

use homescreen_layout::grid::GridGeometry;
use homescreen_layout::loader::{
    AddWorkspaceItemsTask, DeleteReason, ItemRequest, Repair, RowOutcome, RowValidator,
    StaticServices, check_placement,
};
use homescreen_layout::migration::{GridMigration, MigrationPolicy, ReflowMode};
use homescreen_layout::model::{
    Container, Item, ItemId, ItemKind, LaunchIntent, LayoutModel, RestoreFlags, ScreenId,
    UserSerial, check_invariants,
};
use homescreen_layout::store::PersistedRow;

use common::{CHAT, CLOCK, MAIL};

fn validate_all(services: &StaticServices, rows: &[PersistedRow]) -> Vec<RowOutcome> {
    let validator = RowValidator::new(services);
    rows.iter().map(|r| validator.process(r)).collect()
}

fn app(id: i64, container: Container) -> Item {
    Item::new(
        ItemId(id),
        container,
        ItemKind::Application {
            intent: LaunchIntent::for_component(common::component(&format!("com.app{id}"))),
        },
    )
}

#[test]
fn validator_checks_profile_before_location_and_type() {
    let services = common::installed_services();
    let mut wrong_profile = common::app_row(1, MAIL, -5, 0, 0);
    wrong_profile.profile_id = 42;
    let bad_location = common::app_row(2, MAIL, -5, 0, 0);
    let mut bad_type = common::app_row(3, MAIL, 0, 0, 0);
    bad_type.item_type = 99;
    let mut zero_span = common::app_row(4, MAIL, 0, 0, 0);
    zero_span.span_x = 0;

    let outcomes = validate_all(&services, &[wrong_profile, bad_location, bad_type, zero_span]);
    let reasons: Vec<DeleteReason> = outcomes
        .iter()
        .map(|o| match o {
            RowOutcome::Delete(d) => d.reason,
            other => panic!("expected deletion, got {other:?}"),
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            DeleteReason::ProfileDeleted,
            DeleteReason::InvalidLocation,
            DeleteReason::InvalidType,
            DeleteReason::InvalidLocation,
        ]
    );
}

#[test]
fn uninstalled_app_is_kept_only_while_installing() {
    let rows = [common::app_row(1, "com.example.maps", 0, 0, 0)];

    let outcomes = validate_all(&common::installed_services(), &rows);
    assert!(matches!(
        &outcomes[0],
        RowOutcome::Delete(d) if d.reason == DeleteReason::AppNotInstalled
    ));

    let installing = common::installed_services().with_session(
        "com.example.maps",
        "com.example.store",
        UserSerial::PRIMARY,
    );
    let outcomes = validate_all(&installing, &rows);
    let RowOutcome::Accept(item) = &outcomes[0] else {
        panic!("expected pending item, got {:?}", outcomes[0]);
    };
    assert!(matches!(item.kind, ItemKind::PendingRestore { .. }));
}

#[test]
fn restored_app_has_its_pending_flags_cleared() {
    let mut row = common::app_row(1, CHAT, 0, 0, 0);
    row.restored = i64::from(RestoreFlags::RESTORED_ICON.bits());
    let outcomes = validate_all(&common::installed_services(), &[row]);
    let RowOutcome::Repair { item, repair } = &outcomes[0] else {
        panic!("expected repair, got {:?}", outcomes[0]);
    };
    assert_eq!(*repair, Repair::RestoreCompleted);
    assert!(!item.restore.is_pending());
}

#[test]
fn widget_waiting_for_provider_is_flagged() {
    let row = common::widget_row(1, "com.example.weather", 0, 0, 0, 2, 2);
    let services = StaticServices::new().with_session(
        "com.example.weather",
        "com.example.store",
        UserSerial::PRIMARY,
    );
    let outcomes = validate_all(&services, &[row]);
    let RowOutcome::Repair { item, .. } = &outcomes[0] else {
        panic!("expected repair, got {:?}", outcomes[0]);
    };
    assert!(item.restore.contains(RestoreFlags::PROVIDER_NOT_READY));

    let ready = validate_all(
        &common::installed_services(),
        &[common::widget_row(2, CLOCK, 0, 0, 0, 2, 2)],
    );
    assert!(matches!(ready[0], RowOutcome::Accept(_)));
}

#[test]
fn placement_keeps_the_older_of_two_overlapping_items() {
    let grid = GridGeometry::new(4, 4, 4);
    let items = vec![
        app(7, Container::Desktop(ScreenId(0))).with_cell(1, 1),
        app(3, Container::Desktop(ScreenId(0))).with_cell(1, 1),
        app(4, Container::Desktop(ScreenId(0))).with_cell(3, 3).with_span(2, 1),
        app(5, Container::Hotseat(1)),
        app(6, Container::Hotseat(1)),
    ];
    let report = check_placement(items, &grid);
    let kept: Vec<i64> = report.kept.iter().map(|i| i.id.0).collect();
    assert_eq!(kept, vec![3, 5]);
    assert!(report
        .deleted
        .iter()
        .all(|d| d.reason == DeleteReason::InvalidLocation));
    assert_eq!(report.deleted.len(), 3);
}

#[test]
fn folders_need_children_and_children_need_folders() {
    let grid = GridGeometry::new(4, 4, 4);
    let items = vec![
        Item::new(ItemId(1), Container::Desktop(ScreenId(0)), ItemKind::Folder),
        Item::new(ItemId(2), Container::Desktop(ScreenId(0)), ItemKind::Folder).with_cell(1, 0),
        app(3, Container::Folder(ItemId(1))),
        app(4, Container::Folder(ItemId(99))),
    ];
    let report = check_placement(items, &grid);
    let kept: Vec<i64> = report.kept.iter().map(|i| i.id.0).collect();
    assert_eq!(kept, vec![1, 3]);
    let mut deleted: Vec<(i64, DeleteReason)> =
        report.deleted.iter().map(|d| (d.id.0, d.reason)).collect();
    deleted.sort_by_key(|d| d.0);
    assert_eq!(
        deleted,
        vec![
            (2, DeleteReason::EmptyFolder),
            (4, DeleteReason::OrphanedChild),
        ]
    );
}

#[test]
fn adding_to_two_full_screens_creates_the_third() {
    let grid = GridGeometry::new(3, 3, 4);
    let mut items = Vec::new();
    let mut id = 0;
    for screen in 0..2 {
        for y in 0..3 {
            for x in 0..3 {
                id += 1;
                items.push(app(id, Container::Desktop(ScreenId(screen))).with_cell(x, y));
            }
        }
    }
    let model = LayoutModel::from_items(grid, items).unwrap();
    let task = AddWorkspaceItemsTask::new(vec![
        ItemRequest::app(common::component(MAIL)),
        ItemRequest::widget(501, common::component(CLOCK), 2, 2),
    ]);
    let added = task.plan(&model);

    assert_eq!(added.new_screens, vec![ScreenId(2)]);
    assert!(added.animated.is_empty());
    let placed: Vec<(i64, Option<ScreenId>, u32, u32)> = added
        .items()
        .iter()
        .map(|i| (i.id.0, i.screen(), i.cell_x, i.cell_y))
        .collect();
    assert_eq!(
        placed,
        vec![(19, Some(ScreenId(2)), 0, 0), (20, Some(ScreenId(2)), 1, 0)]
    );
}

#[test]
fn shrinking_the_hotseat_moves_the_last_slot_to_the_desktop() {
    let source = GridGeometry::new(5, 5, 5);
    let dest = GridGeometry::new(4, 4, 4);
    let mut items: Vec<Item> = (0..5).map(|slot| app(i64::from(slot) + 1, Container::Hotseat(slot))).collect();
    items.push(app(6, Container::Desktop(ScreenId(0))));

    let outcome = GridMigration::new(MigrationPolicy::default())
        .migrate(&items, source, dest)
        .unwrap();

    assert_eq!(outcome.mode, ReflowMode::InPlace);
    assert_eq!(outcome.hotseat_overflow, vec![ItemId(5)]);
    assert_eq!(outcome.items.len(), 6);
    check_invariants(&outcome.items, &dest).unwrap();
    for item in &outcome.items {
        match item.id.0 {
            1..=4 => assert_eq!(item.container, Container::Hotseat(u32::try_from(item.id.0 - 1).unwrap())),
            5 => assert_eq!(item.container, Container::Desktop(ScreenId(0))),
            _ => {}
        }
    }
}

#[test]
fn large_shrink_reflows_everything_in_reading_order() {
    let source = GridGeometry::new(6, 6, 4);
    let dest = GridGeometry::new(3, 3, 4);
    let items: Vec<Item> = (0..12)
        .map(|n| {
            app(i64::from(n) + 1, Container::Desktop(ScreenId(0)))
                .with_cell(n % 6, n / 6)
        })
        .collect();

    let outcome = GridMigration::new(MigrationPolicy::default())
        .migrate(&items, source, dest)
        .unwrap();

    assert_eq!(outcome.mode, ReflowMode::Full);
    assert_eq!(outcome.items.len(), 12);
    check_invariants(&outcome.items, &dest).unwrap();
    let first = outcome.items.iter().find(|i| i.id == ItemId(1)).unwrap();
    assert_eq!((first.screen(), first.cell_x, first.cell_y), (Some(ScreenId(0)), 0, 0));
    let last = outcome.items.iter().find(|i| i.id == ItemId(12)).unwrap();
    assert_eq!(last.screen(), Some(ScreenId(1)));
}

#[test]
fn identical_grids_leave_the_layout_alone() {
    let grid = GridGeometry::new(4, 5, 4);
    let items = vec![app(1, Container::Desktop(ScreenId(3))).with_cell(2, 2)];
    let outcome = GridMigration::new(MigrationPolicy::default())
        .migrate(&items, grid, grid)
        .unwrap();
    assert_eq!(outcome.mode, ReflowMode::Unchanged);
    assert_eq!(outcome.items, items);
    assert_eq!(outcome.moved, 0);
}
