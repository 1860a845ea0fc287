//! Collection lifecycle commands

use super::print_json;
use crate::db::{validate_collection_name, Distance, VectorDatabase};
use crate::error::Result;
use serde_json::json;
use std::sync::Arc;

pub async fn create(
    db: Arc<dyn VectorDatabase>,
    name: &str,
    distance: Distance,
    vector_size: usize,
    json: bool,
) -> Result<()> {
    validate_collection_name(name)?;
    db.create_collection(name, distance, vector_size).await?;
    if json {
        print_json(&json!({
            "collection": name,
            "distance": distance.to_string(),
            "vector_size": vector_size,
            "status": "created",
        }))?;
    } else {
        println!("Created collection '{}' ({}, {} dimensions)", name, distance, vector_size);
    }
    Ok(())
}

pub async fn delete(db: Arc<dyn VectorDatabase>, name: &str, json: bool) -> Result<()> {
    validate_collection_name(name)?;
    db.delete_collection(name).await?;
    if json {
        print_json(&json!({ "collection": name, "status": "deleted" }))?;
    } else {
        println!("Deleted collection '{}'", name);
    }
    Ok(())
}

pub async fn clear(db: Arc<dyn VectorDatabase>, name: &str, json: bool) -> Result<()> {
    validate_collection_name(name)?;
    db.clear_collection(name).await?;
    if json {
        print_json(&json!({ "collection": name, "status": "cleared" }))?;
    } else {
        println!("Cleared collection '{}'", name);
    }
    Ok(())
}

pub async fn list(db: Arc<dyn VectorDatabase>, json: bool) -> Result<()> {
    let names = db.list_collections().await?;
    if json {
        print_json(&json!({ "collections": names }))?;
        return Ok(());
    }
    if names.is_empty() {
        println!("No collections found");
        return Ok(());
    }
    println!("Collections ({}):", names.len());
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

pub async fn info(db: Arc<dyn VectorDatabase>, name: &str, json: bool) -> Result<()> {
    validate_collection_name(name)?;
    let info = db.collection_info(name).await?;
    if json {
        print_json(&info)?;
    } else {
        println!("Collection: {}", info.name);
        println!("  Points:   {}", info.points_count);
        println!("  Status:   {}", info.status);
    }
    Ok(())
}
