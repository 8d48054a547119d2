//! Prompt templates and help text for the SQL agent

use crate::database::DatabaseBackend;

/// Shown when the API key or a connection is missing
pub const SETUP_INSTRUCTIONS: &str = r#"Create a `.env` file in your working directory with the following variables:

    # Groq configuration (required)
    GROQ_API_KEY=your_groq_api_key_here
    GROQ_MODEL=llama3-70b-8192
    MAX_QUERY_RESULTS=10

    # MySQL defaults for /connect (optional)
    MYSQL_HOST=localhost
    MYSQL_PORT=3306
    MYSQL_USER=your_mysql_username
    MYSQL_PASSWORD=your_mysql_password
    MYSQL_DATABASE=your_database_name

    # PostgreSQL defaults for /connect (optional)
    POSTGRES_HOST=localhost
    POSTGRES_PORT=5432
    POSTGRES_USER=your_postgres_username
    POSTGRES_PASSWORD=your_postgres_password
    POSTGRES_DATABASE=your_database_name

    # Logging (optional)
    LOG_LEVEL=info
    LOG_FILE=sql_agent.log

Get a Groq API key at https://console.groq.com/keys
Then connect with /connect <url|path>, e.g. /connect sqlite://shop.db"#;

/// Starter questions listed by `/examples`
pub const EXAMPLE_QUESTIONS: &[&str] = &[
    "Show me all tables in this database",
    "What are the top 10 records from the largest table?",
    "How many records are in each table?",
    "Show me the schema of all tables",
    "What's the most recent data in the database?",
    "Find tables with more than 1000 records",
    "Show me columns that might contain dates",
];

/// Driver-specific catalog queries the model can lean on
pub fn db_guidance(backend: DatabaseBackend) -> &'static str {
    match backend {
        DatabaseBackend::SQLite => {
            "For SQLite:\n\
             - List tables: SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'\n\
             - Table info: SELECT * FROM pragma_table_info('table_name')"
        }
        DatabaseBackend::MySQL => {
            "For MySQL:\n\
             - List tables: SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'\n\
             - Table info: SELECT COLUMN_NAME, COLUMN_TYPE FROM information_schema.COLUMNS WHERE TABLE_NAME = 'table_name' AND TABLE_SCHEMA = DATABASE()"
        }
        DatabaseBackend::PostgreSQL => {
            "For PostgreSQL:\n\
             - List tables: SELECT tablename FROM pg_tables WHERE schemaname = 'public'\n\
             - Table info: SELECT column_name, data_type FROM information_schema.columns WHERE table_name = 'table_name'"
        }
    }
}

/// System message for one chat session
pub fn system_prompt(backend: DatabaseBackend, schema: &str, max_results: u32) -> String {
    let db_type = backend.name();
    format!(
        "You are a helpful SQL analyst assistant.

Database Type: {db_upper}
Database Schema:
{schema}

{guidance}

Rules:
- Only generate SELECT statements; anything else is refused by the execute_sql tool
- Run exactly one statement per execute_sql call
- Think step-by-step before writing queries
- Use proper SQL syntax for {db_type}
- Results are capped at {max_results} rows unless the query has its own LIMIT; add an explicit LIMIT only when the user asks for more
- If the tool returns 'Error:', analyze the message, revise the SQL and try again
- Maximum 3 attempts per question
- Always show the SQL query you're executing in a ```sql code block
- When the execute_sql tool returns data, include that data as a markdown table in your answer; do not just say it is shown above
- Explain the results in a user-friendly way",
        db_upper = db_type.to_uppercase(),
        schema = schema,
        guidance = db_guidance(backend),
        db_type = db_type,
        max_results = max_results,
    )
}
