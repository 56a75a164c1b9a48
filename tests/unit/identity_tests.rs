/*!
 * Tests for persistent id generation through the controller
 */

use anyhow::Result;
use std::collections::BTreeSet;

use stsync::file_utils::FileManager;
use stsync::Controller;

use crate::common;

#[test]
fn test_generateStids_withRepeatedRuns_shouldNeverReuseIds() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_config(common::test_config(temp_dir.path()))?;

    let mut seen = BTreeSet::new();
    for _ in 0..5 {
        for id in controller.generate_stids(20)? {
            assert!(seen.insert(id), "id issued twice");
        }
    }
    assert_eq!(seen.len(), 100);

    // Inventory file is sorted and holds every issued id
    let inventory = FileManager::read_to_string(temp_dir.path().join("stid_inventory.txt"))?;
    let lines: Vec<&str> = inventory.lines().collect();
    let mut sorted = lines.clone();
    sorted.sort_unstable();
    assert_eq!(lines, sorted);
    assert_eq!(lines.len(), 100);
    Ok(())
}

#[test]
fn test_generateStids_shouldFollowConfiguredShape() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::test_config(temp_dir.path());
    config.inventory.id_length = 10;
    config.inventory.alphabet = "abc234".to_string();
    let controller = Controller::with_config(config)?;

    for id in controller.generate_stids(8)? {
        assert_eq!(id.chars().count(), 10);
        assert!(id.chars().all(|c| "abc234".contains(c)));
    }
    Ok(())
}
