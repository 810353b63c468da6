//! The `skillcheck init` command.

use std::path::Path;

use anyhow::Result;

use skillcheck_providers::config::SAMPLE_CONFIG;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("skillcheck.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("samples")?;
    write_if_missing(Path::new("samples/submission.json"), EXAMPLE_SUBMISSION)?;
    write_if_missing(Path::new("samples/quiz-spec.json"), EXAMPLE_QUIZ_SPEC)?;

    println!("\nNext steps:");
    println!("  1. Set GROQ_API_KEY (or edit skillcheck.toml)");
    println!("  2. Run: skillcheck grade --submission samples/submission.json");
    println!("  3. Run: skillcheck quiz --spec samples/quiz-spec.json --plan-only");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const EXAMPLE_SUBMISSION: &str = r#"{
  "id": "sub-001",
  "student_id": "student-042",
  "topic": "Electrical Safety",
  "closed_questions": [
    {
      "id": "q1",
      "text": "Which colour is the protective earth conductor?",
      "type": "mcq",
      "correct_answer": "C",
      "student_answer": "C",
      "max_points": 5
    },
    {
      "id": "q2",
      "text": "A residual current device protects against overload.",
      "type": "true_false",
      "correct_answer": "false",
      "student_answer": "true",
      "max_points": 3
    }
  ],
  "open_questions": [
    {
      "id": "q3",
      "text": "Describe how to isolate a circuit before maintenance.",
      "type": "short_answer",
      "rubric": "Switch off, lock out, tag, and prove dead with a tested voltage indicator.",
      "keywords": ["lock out", "tag", "voltage", "prove dead"],
      "student_answer": "Turn off the breaker, lock out and tag it, then check for voltage.",
      "max_points": 10
    }
  ]
}
"#;

const EXAMPLE_QUIZ_SPEC: &str = r#"{
  "topic": "Electrical Safety",
  "subtopics": ["Isolation", "Earthing", "RCD testing"],
  "difficulty": "intermediate",
  "counts": {"mcq": 4, "true_false": 2, "short_answer": 2},
  "excluded_topics": [],
  "weak_areas": ["Earthing"]
}
"#;
